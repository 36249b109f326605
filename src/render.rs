use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Row, Table};

use crate::store::{QueryResult, Value};

pub const NO_RESULTS: &str = "No results found.";

/// Lay a result out as a bordered plain-text table.
pub fn render_table(result: &QueryResult) -> String {
    if result.rows.is_empty() {
        return NO_RESULTS.to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .force_no_tty();

    table.set_header(
        result
            .columns
            .iter()
            .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );

    for values in &result.rows {
        let mut row = Row::new();
        for value in values {
            let alignment = match value {
                Value::Integer(_) | Value::Real(_) => CellAlignment::Right,
                _ => CellAlignment::Left,
            };
            row.add_cell(Cell::new(value).set_alignment(alignment));
        }
        table.add_row(row);
    }

    table.to_string()
}
