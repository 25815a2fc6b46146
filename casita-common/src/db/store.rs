//! Storage-agnostic table access

use crate::model::{RowSet, SourceTable, TableEntry};
use crate::Result;
use async_trait::async_trait;

/// Row filter applied by [`TableStore::query`]
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    /// Every row
    All,
    /// Rows whose column equals the value exactly
    Equals { column: String, value: String },
    /// Rows whose column contains the needle, ignoring case (full Unicode folding)
    ///
    /// Stores may have to read the whole table to apply this filter.
    ContainsIgnoreCase { column: String, needle: String },
}

/// A read against one named table
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    /// Columns to return; `None` returns every column
    pub columns: Option<Vec<String>>,
    pub filter: RowFilter,
    /// Collapse identical result rows, keeping the first occurrence
    pub distinct: bool,
}

impl TableQuery {
    /// `SELECT *` with no filter
    pub fn all() -> Self {
        Self {
            columns: None,
            filter: RowFilter::All,
            distinct: false,
        }
    }

    /// `SELECT *` filtered by exact column match
    pub fn equals(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            columns: None,
            filter: RowFilter::Equals {
                column: column.into(),
                value: value.into(),
            },
            distinct: false,
        }
    }

    /// Filter by case-insensitive substring match
    pub fn contains(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Self {
            columns: None,
            filter: RowFilter::ContainsIgnoreCase {
                column: column.into(),
                needle: needle.into(),
            },
            distinct: false,
        }
    }

    pub fn select<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

/// Table storage used by ingestion (writes) and lookups (reads)
///
/// Implementations must be safe to share between concurrent lookups. Writes
/// replace the whole snapshot and are not expected to run concurrently with
/// each other.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Registered tables with their declared column capabilities
    async fn catalog(&self) -> Result<Vec<TableEntry>>;

    /// Run a read against one named table
    async fn query(&self, table: &str, query: &TableQuery) -> Result<RowSet>;

    /// Replace the persisted state with `tables`
    ///
    /// Tables absent from the new snapshot are dropped; every table in it is
    /// recreated from scratch.
    async fn write_snapshot(&self, tables: &[SourceTable]) -> Result<()>;
}
