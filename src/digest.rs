use std::fmt;

use crate::error::ExecutionError;
use crate::store::{Store, TableRef, Value};

/// Columns with at least this many distinct values are treated as
/// high-cardinality and never have their values disclosed.
pub const DISTINCT_VALUE_LIMIT: usize = 20;

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnValues {
    pub column: String,
    pub values: Vec<Value>,
}

impl fmt::Display for ColumnValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self
            .values
            .iter()
            .map(Value::literal)
            .collect::<Vec<_>>()
            .join(", ");

        write!(f, "- Column '{}' has unique values: [{values}]", self.column)
    }
}

/// Low-cardinality columns of a table together with their values, in
/// declared column order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchemaDigest {
    pub disclosed: Vec<ColumnValues>,
}

impl SchemaDigest {
    pub fn is_empty(&self) -> bool {
        self.disclosed.is_empty()
    }
}

impl fmt::Display for SchemaDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.disclosed.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

pub fn build_digest(store: &Store, table: &TableRef) -> Result<SchemaDigest, ExecutionError> {
    let mut disclosed = Vec::new();

    for column in &table.columns {
        // Reaching the limit is enough to rule the column out.
        let values = store.distinct_values(&table.name, column, Some(DISTINCT_VALUE_LIMIT))?;

        if values.len() < DISTINCT_VALUE_LIMIT {
            disclosed.push(ColumnValues {
                column: column.clone(),
                values,
            });
        } else {
            tracing::trace!(column = %column, "skipping high-cardinality column");
        }
    }

    Ok(SchemaDigest { disclosed })
}
