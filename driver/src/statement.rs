use std::fmt;

use sqlparser::ast::Statement;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

use crate::error::PolicyError;

/// SQL text produced by a model. It is never assumed to be valid and can only
/// reach the store through the executor's error channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UntrustedStatement(String);

impl UntrustedStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Check the statement against `policy`, handing back the raw text when admitted.
    pub fn admit(&self, policy: StatementPolicy) -> Result<&str, PolicyError> {
        match policy {
            StatementPolicy::Unrestricted => Ok(&self.0),
            StatementPolicy::ReadOnly => {
                let parsed = Parser::parse_sql(&SQLiteDialect {}, &self.0)
                    .map_err(|e| PolicyError::Unparsable(e.to_string()))?;

                if parsed.len() != 1 {
                    return Err(PolicyError::StatementCount(parsed.len()));
                }

                match &parsed[0] {
                    Statement::Query(_) => Ok(&self.0),
                    other => Err(PolicyError::NotReadOnly(other.to_string())),
                }
            }
        }
    }
}

impl fmt::Display for UntrustedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UntrustedStatement {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which generated statements the executor is willing to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatementPolicy {
    /// Run whatever the model produced, including DML and DDL.
    #[default]
    Unrestricted,
    /// Admit a single query (SELECT / WITH / VALUES) and nothing else.
    ReadOnly,
}
