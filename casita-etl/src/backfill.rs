//! Common name → scientific name backfill
//!
//! Some sheets only carry common names. Every table that has both columns
//! contributes to a [`CommonNameIndex`], and tables lacking `scientific_name`
//! get one filled from it so they can be resolved like the rest.

use casita_common::model::{cell_text, columns, SourceTable};
use casita_common::Result;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Lower-cased common name → lower-cased scientific name
#[derive(Debug, Clone, Default)]
pub struct CommonNameIndex {
    map: HashMap<String, String>,
}

impl CommonNameIndex {
    /// Build from every table exposing both name columns
    ///
    /// `;`-delimited common names contribute one entry per part. Tables are
    /// scanned in order and later entries overwrite earlier ones.
    pub fn build(tables: &[SourceTable]) -> Self {
        let mut map = HashMap::new();

        for table in tables {
            let (Some(common_idx), Some(sci_idx)) = (
                table.column_index(columns::COMMON_NAME),
                table.column_index(columns::SCIENTIFIC_NAME),
            ) else {
                continue;
            };

            for row in &table.rows {
                let (Some(common), Some(scientific)) =
                    (cell_text(&row[common_idx]), cell_text(&row[sci_idx]))
                else {
                    continue;
                };
                let scientific = scientific.trim().to_lowercase();
                for part in common.split(';') {
                    map.insert(part.trim().to_lowercase(), scientific.clone());
                }
            }
        }

        debug!("Common name index holds {} names", map.len());
        Self { map }
    }

    /// Scientific name for a common name, case-insensitive
    pub fn get(&self, common_name: &str) -> Option<&str> {
        self.map.get(&common_name.trim().to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Add `scientific_name` to tables that have `common_name` but not it
///
/// The whole common name cell is the lookup key. Returns the number of tables
/// that gained the column.
pub fn backfill_scientific_names(tables: &mut [SourceTable], index: &CommonNameIndex) -> Result<usize> {
    let mut filled = 0;

    for table in tables.iter_mut() {
        if table.has_column(columns::SCIENTIFIC_NAME) {
            continue;
        }
        let Some(common_idx) = table.column_index(columns::COMMON_NAME) else {
            continue;
        };

        let values: Vec<Value> = table
            .rows
            .iter()
            .map(|row| {
                cell_text(&row[common_idx])
                    .and_then(|name| index.get(&name).map(|s| Value::String(s.to_string())))
                    .unwrap_or(Value::Null)
            })
            .collect();

        let matched = values.iter().filter(|v| !v.is_null()).count();
        debug!(
            "{}: backfilled scientific_name for {}/{} rows",
            table.name,
            matched,
            values.len()
        );

        table.set_column(columns::SCIENTIFIC_NAME, values)?;
        filled += 1;
    }

    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(name: &str, cols: &[&str], rows: Vec<Vec<Value>>) -> SourceTable {
        SourceTable::with_rows(name, cols.iter().map(|s| s.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn test_index_splits_and_lowercases() {
        let index = CommonNameIndex::build(&[table(
            "nombres",
            &["common_name", "scientific_name"],
            vec![
                vec![json!("Ajo;Ajo blanco"), json!("Allium Sativum ")],
                vec![json!("Menta"), Value::Null],
            ],
        )]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("AJO BLANCO"), Some("allium sativum"));
        assert_eq!(index.get("menta"), None);
    }

    #[test]
    fn test_last_writer_wins() {
        let index = CommonNameIndex::build(&[
            table("a", &["common_name", "scientific_name"], vec![vec![json!("Cedrón"), json!("aloysia citrodora")]]),
            table("b", &["common_name", "scientific_name"], vec![vec![json!("cedrón"), json!("aloysia triphylla")]]),
        ]);
        assert_eq!(index.get("Cedrón"), Some("aloysia triphylla"));
    }

    #[test]
    fn test_backfill_only_tables_missing_scientific_name() {
        let mut tables = vec![
            table(
                "nombres",
                &["common_name", "scientific_name"],
                vec![vec![json!("Ajo"), json!("allium sativum")]],
            ),
            table(
                "calendario",
                &["common_name", "mes"],
                vec![
                    vec![json!("AJO"), json!("Mayo")],
                    vec![json!("Zapallo"), json!("Octubre")],
                    vec![Value::Null, json!("Enero")],
                ],
            ),
            table("notas", &["texto"], vec![vec![json!("x")]]),
        ];

        let index = CommonNameIndex::build(&tables);
        let filled = backfill_scientific_names(&mut tables, &index).unwrap();

        assert_eq!(filled, 1);
        assert_eq!(tables[1].cell(0, "scientific_name"), Some(&json!("allium sativum")));
        assert_eq!(tables[1].cell(1, "scientific_name"), Some(&Value::Null));
        assert_eq!(tables[1].cell(2, "scientific_name"), Some(&Value::Null));
        assert!(!tables[2].has_column("scientific_name"));
    }
}
