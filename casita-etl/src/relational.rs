//! Relational explosion of delimited attribute columns
//!
//! A cell like `"Ajo;Ajo blanco"` becomes one row per value in a derived table
//! named `"<table> → <column>"`, so each attribute value can be matched to a
//! plant on its own.

use crate::normalize::capitalize;
use casita_common::model::{cell_text, columns, SourceTable};
use casita_common::Result;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Separator between source table and column in derived table names
pub const RELATION_SEPARATOR: &str = " → ";

/// Explode `column` of `table` into a derived relational table
///
/// Output columns: `scientific_name`, `column`, `source`, `plant_id`. Rows
/// with a null name, value, or source are dropped, as are exploded rows that
/// have no `plant_id`. Exact duplicates keep their first occurrence. Returns
/// `None` when the table lacks `scientific_name` or the column.
pub fn explode_column(table: &SourceTable, column: &str) -> Result<Option<SourceTable>> {
    let (Some(sci_idx), Some(col_idx)) = (
        table.column_index(columns::SCIENTIFIC_NAME),
        table.column_index(column),
    ) else {
        return Ok(None);
    };
    let source_idx = table.column_index(columns::SOURCE);
    let plant_idx = table.column_index(columns::PLANT_ID);

    let mut derived = SourceTable::new(
        format!("{}{}{}", table.name, RELATION_SEPARATOR, column),
        vec![
            columns::SCIENTIFIC_NAME.to_string(),
            column.to_string(),
            columns::SOURCE.to_string(),
            columns::PLANT_ID.to_string(),
        ],
    )?;
    let mut seen = HashSet::new();

    for row in &table.rows {
        let scientific = &row[sci_idx];
        let source = source_idx.map(|i| &row[i]).unwrap_or(&Value::Null);
        let plant_id = plant_idx.map(|i| &row[i]).unwrap_or(&Value::Null);
        let Some(text) = cell_text(&row[col_idx]) else {
            continue;
        };
        if scientific.is_null() || source.is_null() || plant_id.is_null() {
            continue;
        }

        for part in text.split(';') {
            let exploded = vec![
                scientific.clone(),
                Value::String(capitalize(part.trim())),
                source.clone(),
                plant_id.clone(),
            ];
            let key = serde_json::to_string(&exploded)?;
            if seen.insert(key) {
                derived.push_row(exploded)?;
            }
        }
    }

    debug!("{}: {} exploded rows", derived.name, derived.rows.len());
    Ok(Some(derived))
}
