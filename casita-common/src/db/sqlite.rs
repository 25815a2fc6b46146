//! SQLite-backed [`TableStore`]
//!
//! Every persisted table is an untyped SQLite relation; cells keep whatever
//! JSON type they had (text, integer, real, null). A reserved registry table
//! records each table's columns and capability flags, and discovery reads
//! only that registry.

use super::init::{connect_readonly, init_database};
use super::store::{RowFilter, TableQuery, TableStore};
use crate::model::{columns, ColumnCapabilities, RowSet, SourceTable, TableEntry};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row, SqlitePool, ValueRef};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// SQLite table store
#[derive(Debug, Clone)]
pub struct SqliteTableStore {
    pool: SqlitePool,
}

impl SqliteTableStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database read-write, creating it if missing
    pub async fn open(db_path: &Path) -> Result<Self> {
        Ok(Self::new(init_database(db_path).await?))
    }

    /// Open an existing database read-only
    pub async fn open_readonly(db_path: &Path) -> Result<Self> {
        Ok(Self::new(connect_readonly(db_path).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Column names of a table, in table order (PRAGMA table_info)
    async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", quote_ident(table)))
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Err(Error::NotFound(format!("no such table: {}", table)));
        }

        // PRAGMA table_info returns: (cid, name, type, notnull, dflt_value, pk)
        Ok(rows.iter().map(|row| row.get::<String, _>(1)).collect())
    }
}

#[async_trait]
impl TableStore for SqliteTableStore {
    async fn catalog(&self) -> Result<Vec<TableEntry>> {
        let rows = sqlx::query_as::<_, (String, String, i64, i64, i64, i64)>(&format!(
            "SELECT name, columns, has_common_name, has_scientific_name, has_plant_id, row_count
             FROM {}
             ORDER BY name ASC",
            quote_ident(columns::REGISTRY_TABLE)
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(name, column_json, common, scientific, plant_id, row_count)| -> Result<TableEntry> {
                Ok(TableEntry {
                    name,
                    columns: serde_json::from_str(&column_json)?,
                    capabilities: ColumnCapabilities {
                        has_common_name: common != 0,
                        has_scientific_name: scientific != 0,
                        has_plant_id: plant_id != 0,
                    },
                    row_count,
                })
            })
            .collect()
    }

    async fn query(&self, table: &str, query: &TableQuery) -> Result<RowSet> {
        let projection = match &query.columns {
            Some(cols) if !cols.is_empty() => cols
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            _ => "*".to_string(),
        };

        let mut sql = format!(
            "SELECT {}{} FROM {}",
            if query.distinct { "DISTINCT " } else { "" },
            projection,
            quote_ident(table)
        );

        let rows = match &query.filter {
            RowFilter::Equals { column, value } => {
                sql.push_str(&format!(" WHERE {} = ?", quote_ident(column)));
                sqlx::query(&sql).bind(value).fetch_all(&self.pool).await?
            }
            // Substring matching happens below: SQLite's LOWER() only folds ASCII
            RowFilter::All | RowFilter::ContainsIgnoreCase { .. } => {
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };

        let result_columns = match (rows.first(), &query.columns) {
            (Some(first), _) => first.columns().iter().map(|c| c.name().to_string()).collect(),
            (None, Some(cols)) if !cols.is_empty() => cols.clone(),
            (None, _) => self.table_columns(table).await?,
        };

        let mut values: Vec<Vec<Value>> = rows.iter().map(row_to_values).collect();

        if let RowFilter::ContainsIgnoreCase { column, needle } = &query.filter {
            let idx = result_columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| {
                    Error::InvalidInput(format!("no such column: {}.{}", table, column))
                })?;
            let needle = needle.to_lowercase();
            values.retain(|row| match &row[idx] {
                Value::String(s) => s.to_lowercase().contains(&needle),
                _ => false,
            });
        }

        debug!("Query on '{}' returned {} rows", table, values.len());

        Ok(RowSet {
            columns: result_columns,
            rows: values,
        })
    }

    async fn write_snapshot(&self, tables: &[SourceTable]) -> Result<()> {
        let mut names = HashSet::new();
        for table in tables {
            if table.name == columns::REGISTRY_TABLE {
                return Err(Error::InvalidInput(format!(
                    "'{}' is a reserved table name",
                    table.name
                )));
            }
            if table.columns.is_empty() {
                return Err(Error::InvalidInput(format!("table '{}' has no columns", table.name)));
            }
            if !names.insert(table.name.as_str()) {
                return Err(Error::NameCollision {
                    first: table.name.clone(),
                    second: table.name.clone(),
                    normalized: table.name.clone(),
                });
            }
        }

        let registry = quote_ident(columns::REGISTRY_TABLE);
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                name TEXT PRIMARY KEY,
                columns TEXT NOT NULL,
                has_common_name INTEGER NOT NULL,
                has_scientific_name INTEGER NOT NULL,
                has_plant_id INTEGER NOT NULL,
                row_count INTEGER NOT NULL,
                written_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            registry
        ))
        .execute(&mut *tx)
        .await?;

        // Drop tables left over from the previous snapshot
        let previous: Vec<(String,)> = sqlx::query_as(&format!("SELECT name FROM {}", registry))
            .fetch_all(&mut *tx)
            .await?;
        for (stale,) in previous {
            if !names.contains(stale.as_str()) {
                sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(&stale)))
                    .execute(&mut *tx)
                    .await?;
                debug!("Dropped stale table '{}'", stale);
            }
        }
        sqlx::query(&format!("DELETE FROM {}", registry))
            .execute(&mut *tx)
            .await?;

        for table in tables {
            let name = quote_ident(&table.name);
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", name))
                .execute(&mut *tx)
                .await?;

            let column_list = table
                .columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            sqlx::query(&format!("CREATE TABLE {} ({})", name, column_list))
                .execute(&mut *tx)
                .await?;

            let placeholders = vec!["?"; table.columns.len()].join(", ");
            let insert = format!("INSERT INTO {} VALUES ({})", name, placeholders);
            for row in &table.rows {
                let mut query = sqlx::query(&insert);
                for value in row {
                    query = bind_value(query, value);
                }
                query.execute(&mut *tx).await?;
            }

            let caps = table.capabilities();
            sqlx::query(&format!(
                "INSERT INTO {} (name, columns, has_common_name, has_scientific_name, has_plant_id, row_count)
                 VALUES (?, ?, ?, ?, ?, ?)",
                registry
            ))
            .bind(&table.name)
            .bind(serde_json::to_string(&table.columns)?)
            .bind(caps.has_common_name as i64)
            .bind(caps.has_scientific_name as i64)
            .bind(caps.has_plant_id as i64)
            .bind(table.rows.len() as i64)
            .execute(&mut *tx)
            .await?;

            debug!("Wrote table '{}' ({} rows)", table.name, table.rows.len());
        }

        tx.commit().await?;
        info!("Snapshot written: {} tables", tables.len());
        Ok(())
    }
}

/// Quote an SQL identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Bind one JSON cell with its natural SQLite type
fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        other => query.bind(other.to_string()),
    }
}

/// Convert a SQLite row to JSON cells
fn row_to_values(row: &SqliteRow) -> Vec<Value> {
    (0..row.len())
        .map(|i| {
            row.try_get_raw(i)
                .ok()
                .and_then(|val| {
                    if val.is_null() {
                        Some(Value::Null)
                    } else {
                        row.try_get::<String, _>(i)
                            .ok()
                            .map(Value::String)
                            .or_else(|| row.try_get::<i64, _>(i).ok().map(|v| json!(v)))
                            .or_else(|| row.try_get::<f64, _>(i).ok().map(|v| json!(v)))
                    }
                })
                .unwrap_or(Value::Null)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table(name: &str, cols: &[&str], rows: Vec<Vec<Value>>) -> SourceTable {
        SourceTable::with_rows(name, cols.iter().map(|s| s.to_string()).collect(), rows).unwrap()
    }

    async fn temp_store() -> (SqliteTableStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteTableStore::open(&dir.path().join("test.db")).await.unwrap();
        (store, dir)
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("mes siembra"), "\"mes siembra\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[tokio::test]
    async fn test_catalog_reflects_written_capabilities() {
        let (store, _dir) = temp_store().await;
        store
            .write_snapshot(&[
                table(
                    "frutales",
                    &["common_name", "scientific_name", "plant_id"],
                    vec![vec![json!("Ajo"), json!("allium sativum"), json!("P0001")]],
                ),
                table("notes", &["texto"], vec![vec![json!("x")]]),
            ])
            .await
            .unwrap();

        let catalog = store.catalog().await.unwrap();
        assert_eq!(catalog.len(), 2);

        let frutales = catalog.iter().find(|e| e.name == "frutales").unwrap();
        assert!(frutales.capabilities.supports_name_search());
        assert!(frutales.capabilities.has_scientific_name);
        assert_eq!(frutales.row_count, 1);

        let notes = catalog.iter().find(|e| e.name == "notes").unwrap();
        assert_eq!(notes.capabilities, ColumnCapabilities::default());
        assert_eq!(notes.columns, vec!["texto".to_string()]);
    }

    #[tokio::test]
    async fn test_snapshot_drops_stale_tables() {
        let (store, _dir) = temp_store().await;
        store
            .write_snapshot(&[table("old", &["a"], vec![vec![json!(1)]])])
            .await
            .unwrap();
        store
            .write_snapshot(&[table("new", &["a"], vec![vec![json!(2)]])])
            .await
            .unwrap();

        let names: Vec<String> = store.catalog().await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["new".to_string()]);
        assert!(store.query("old", &TableQuery::all()).await.is_err());
    }

    #[tokio::test]
    async fn test_cell_types_preserved() {
        let (store, _dir) = temp_store().await;
        store
            .write_snapshot(&[table(
                "mixed",
                &["text", "int", "real", "empty"],
                vec![vec![json!("hola"), json!(7), json!(1.5), Value::Null]],
            )])
            .await
            .unwrap();

        let result = store.query("mixed", &TableQuery::all()).await.unwrap();
        assert_eq!(result.columns, vec!["text", "int", "real", "empty"]);
        assert_eq!(result.rows[0], vec![json!("hola"), json!(7), json!(1.5), Value::Null]);
    }

    #[tokio::test]
    async fn test_equals_and_contains_filters() {
        let (store, _dir) = temp_store().await;
        store
            .write_snapshot(&[table(
                "nombres",
                &["common_name", "plant_id"],
                vec![
                    vec![json!("Árnica"), json!("P0001")],
                    vec![json!("Ajo"), json!("P0002")],
                    vec![json!("Ajo"), json!("P0002")],
                    vec![Value::Null, json!("P0003")],
                ],
            )])
            .await
            .unwrap();

        let exact = store
            .query("nombres", &TableQuery::equals("plant_id", "P0002"))
            .await
            .unwrap();
        assert_eq!(exact.len(), 2);

        let accented = store
            .query("nombres", &TableQuery::contains("common_name", "árn"))
            .await
            .unwrap();
        assert_eq!(accented.len(), 1);

        let distinct = store
            .query(
                "nombres",
                &TableQuery::contains("common_name", "AJO")
                    .select(["common_name", "plant_id"])
                    .distinct(),
            )
            .await
            .unwrap();
        assert_eq!(distinct.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_result_keeps_columns() {
        let (store, _dir) = temp_store().await;
        store
            .write_snapshot(&[table("t", &["plant_id", "uso"], vec![vec![json!("P0001"), json!("x")]])])
            .await
            .unwrap();

        let result = store
            .query("t", &TableQuery::equals("plant_id", "P9999"))
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.columns, vec!["plant_id", "uso"]);
    }

    #[tokio::test]
    async fn test_missing_column_is_an_error() {
        let (store, _dir) = temp_store().await;
        store
            .write_snapshot(&[table("t", &["a"], vec![vec![json!(1)]])])
            .await
            .unwrap();

        assert!(store.query("t", &TableQuery::equals("plant_id", "P0001")).await.is_err());
        assert!(store.query("t", &TableQuery::contains("common_name", "x")).await.is_err());
    }

    #[tokio::test]
    async fn test_reserved_and_duplicate_names_rejected() {
        let (store, _dir) = temp_store().await;
        let reserved = store
            .write_snapshot(&[table(columns::REGISTRY_TABLE, &["a"], vec![])])
            .await;
        assert!(matches!(reserved, Err(Error::InvalidInput(_))));

        let duplicate = store
            .write_snapshot(&[table("t", &["a"], vec![]), table("t", &["b"], vec![])])
            .await;
        assert!(matches!(duplicate, Err(Error::NameCollision { .. })));
    }

    #[tokio::test]
    async fn test_catalog_without_snapshot_fails() {
        let (store, _dir) = temp_store().await;
        assert!(store.catalog().await.is_err());
    }
}
