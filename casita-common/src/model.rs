//! Table data model
//!
//! Every source sheet becomes a rectangular [`SourceTable`]: an ordered list of
//! column names plus rows of JSON cell values. The only columns the services
//! care about by name are the identifying ones in [`columns`]; everything else
//! is carried through untouched.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Well-known column and table names
pub mod columns {
    /// Common (vernacular) plant name, possibly `;`-delimited
    pub const COMMON_NAME: &str = "common_name";
    /// Scientific plant name, lower-cased
    pub const SCIENTIFIC_NAME: &str = "scientific_name";
    /// Canonical plant identifier assigned by the identity resolver
    pub const PLANT_ID: &str = "plant_id";
    /// Cluster representative name in the canonical table
    pub const CANONICAL_LABEL: &str = "canonical_label";
    /// Provenance citation added to every loaded table
    pub const SOURCE: &str = "source";

    /// Table holding the canonical plant identities
    pub const CANONICAL_TABLE: &str = "plant_base";
    /// Table holding the declared column capabilities of every persisted table
    pub const REGISTRY_TABLE: &str = "table_registry";
}

/// One row as a JSON object keyed by column name
pub type Record = Map<String, Value>;

/// Which identifying columns a table exposes
///
/// Discovery is a filter over these flags rather than a schema probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCapabilities {
    pub has_common_name: bool,
    pub has_scientific_name: bool,
    pub has_plant_id: bool,
}

impl ColumnCapabilities {
    /// Derive capabilities from a column list
    pub fn from_columns<S: AsRef<str>>(columns: &[S]) -> Self {
        let has = |wanted: &str| columns.iter().any(|c| c.as_ref() == wanted);
        Self {
            has_common_name: has(columns::COMMON_NAME),
            has_scientific_name: has(columns::SCIENTIFIC_NAME),
            has_plant_id: has(columns::PLANT_ID),
        }
    }

    /// Eligible for name resolution (common name search)
    pub fn supports_name_search(&self) -> bool {
        self.has_common_name && self.has_plant_id
    }
}

/// Catalog entry for one persisted table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    /// Stored (normalized) table name
    pub name: String,
    /// Column names in table order
    pub columns: Vec<String>,
    /// Declared identifying-column capabilities
    pub capabilities: ColumnCapabilities,
    /// Number of rows at write time
    pub row_count: i64,
}

impl TableEntry {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// A rectangular table loaded from one source sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTable {
    /// Logical table name (e.g. `"Tablas.xlsx / frutales"`) until normalized for storage
    pub name: String,
    /// Column names, unique and non-empty
    pub columns: Vec<String>,
    /// Rows, each exactly `columns.len()` wide
    pub rows: Vec<Vec<Value>>,
}

impl SourceTable {
    /// Create an empty table, rejecting empty or duplicate column names
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Result<Self> {
        let name = name.into();
        let mut seen = HashSet::new();
        for column in &columns {
            if column.trim().is_empty() {
                return Err(Error::InvalidInput(format!("table '{}' has an empty column name", name)));
            }
            if !seen.insert(column.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "table '{}' has duplicate column '{}'",
                    name, column
                )));
            }
        }

        Ok(Self {
            name,
            columns,
            rows: Vec::new(),
        })
    }

    /// Create a table and fill it with rows
    pub fn with_rows(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self> {
        let mut table = Self::new(name, columns)?;
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Append a row; its width must match the column count
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::InvalidInput(format!(
                "table '{}': row has {} cells, expected {}",
                self.name,
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn capabilities(&self) -> ColumnCapabilities {
        ColumnCapabilities::from_columns(&self.columns)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    /// Cell at `(row, column)`, if the column exists
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Add a column, or overwrite it in place when it already exists
    ///
    /// `values` must hold one cell per row.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(Error::InvalidInput(format!(
                "table '{}': column '{}' has {} values for {} rows",
                self.name,
                name,
                values.len(),
                self.rows.len()
            )));
        }

        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Rows as JSON objects keyed by column name
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }
}

/// Textual form of a cell, `None` for null
///
/// Numbers and booleans are rendered the way they print, so a numeric cell can
/// still be used as a lookup key.
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Canonical plant identity row
///
/// The canonical table holds one of these per name variant, so the same
/// `plant_id` appears once for every member of its cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantRecord {
    pub plant_id: String,
    pub scientific_name: String,
    pub canonical_label: String,
}

impl PlantRecord {
    /// Column order of the canonical table
    pub fn column_names() -> Vec<String> {
        vec![
            columns::PLANT_ID.to_string(),
            columns::SCIENTIFIC_NAME.to_string(),
            columns::CANONICAL_LABEL.to_string(),
        ]
    }

    pub fn to_row(&self) -> Vec<Value> {
        vec![
            Value::String(self.plant_id.clone()),
            Value::String(self.scientific_name.clone()),
            Value::String(self.canonical_label.clone()),
        ]
    }

    /// Parse a canonical table row; `None` if any field is missing
    pub fn from_record(record: &Record) -> Option<Self> {
        let field = |name: &str| record.get(name).and_then(cell_text);
        Some(Self {
            plant_id: field(columns::PLANT_ID)?,
            scientific_name: field(columns::SCIENTIFIC_NAME)?,
            canonical_label: field(columns::CANONICAL_LABEL)?,
        })
    }
}

/// Result of a read query against one table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Rows as JSON objects keyed by column name
    pub fn into_records(self) -> Vec<Record> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect()
    }
}
