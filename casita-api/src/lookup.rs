//! Federated plant lookups
//!
//! Tables are not known in advance. Every call reads the store's catalog and
//! picks the tables whose declared capabilities fit the query, then queries
//! them concurrently. Each table contributes one [`TableOutcome`]; a failing
//! table only spoils its own slot. Only a catalog failure (or timeout) fails
//! the whole call.

use casita_common::db::{TableQuery, TableStore};
use casita_common::model::{cell_text, columns, PlantRecord, Record, TableEntry};
use casita_common::Error;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Total failure of a lookup call
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("table discovery failed: {0}")]
    Discovery(#[source] Error),

    #[error("table discovery timed out after {0:?}")]
    DiscoveryTimeout(Duration),

    #[error("canonical table unreadable: {0}")]
    Canonical(#[source] Error),
}

/// What one discovered table contributed to a fan-out
#[derive(Debug)]
pub enum TableOutcome<T> {
    Matched(T),
    Empty,
    /// Table lacks the columns the query needs
    NotApplicable,
    Failed(Error),
}

/// A table that could not be queried during a name lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFailure {
    pub table: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameMatch {
    pub common_name: String,
    pub scientific_name: Option<String>,
    pub plant_id: Option<String>,
    pub source_table: String,
    /// The row's `source` cell, when the table has one
    pub citation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameResolution {
    pub query: String,
    pub matches: Vec<NameMatch>,
    pub failed_sources: Vec<SourceFailure>,
}

impl NameResolution {
    pub fn is_not_found(&self) -> bool {
        self.matches.is_empty()
    }
}

/// One table's slot in a [`FullRecord`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Section {
    Rows(Vec<Record>),
    NotFound { message: String },
    Error { error: String },
}

/// Everything known about one plant, keyed by table name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullRecord {
    pub plant_id: String,
    pub sections: BTreeMap<String, Section>,
}

/// Read-only lookups over a [`TableStore`]
pub struct FederatedLookup<S: TableStore + ?Sized> {
    store: Arc<S>,
    discovery_timeout: Option<Duration>,
}

impl<S: TableStore + ?Sized> Clone for FederatedLookup<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            discovery_timeout: self.discovery_timeout,
        }
    }
}

impl<S: TableStore + ?Sized> FederatedLookup<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            discovery_timeout: None,
        }
    }

    /// Bound the catalog scan; exceeding it fails the call
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every registered table, read fresh
    pub async fn discover(&self) -> Result<Vec<TableEntry>, LookupError> {
        let catalog = self.store.catalog();
        let result = match self.discovery_timeout {
            Some(limit) => tokio::time::timeout(limit, catalog)
                .await
                .map_err(|_| LookupError::DiscoveryTimeout(limit))?,
            None => catalog.await,
        };
        result.map_err(LookupError::Discovery)
    }

    /// All canonical records
    pub async fn list_plants(&self) -> Result<Vec<PlantRecord>, LookupError> {
        let rows = self
            .store
            .query(columns::CANONICAL_TABLE, &TableQuery::all())
            .await
            .map_err(LookupError::Canonical)?;

        Ok(rows
            .into_records()
            .iter()
            .filter_map(PlantRecord::from_record)
            .collect())
    }

    /// The canonical record for an identifier (the cluster's seed row)
    pub async fn get_plant(&self, plant_id: &str) -> Result<Option<PlantRecord>, LookupError> {
        let plant_id = required(plant_id, "plant_id")?;
        let rows = self
            .store
            .query(
                columns::CANONICAL_TABLE,
                &TableQuery::equals(columns::PLANT_ID, plant_id),
            )
            .await
            .map_err(LookupError::Canonical)?;

        Ok(rows
            .into_records()
            .iter()
            .find_map(PlantRecord::from_record))
    }

    /// Rows whose `common_name` contains `text`, case-insensitively, from
    /// every table that has both `common_name` and `plant_id`
    pub async fn resolve_by_common_name(&self, text: &str) -> Result<NameResolution, LookupError> {
        let query = required(text, "name")?.to_string();
        let catalog = self.discover().await?;

        let outcomes = join_all(catalog.iter().map(|entry| self.search_table(entry, &query))).await;

        let mut resolution = NameResolution {
            query,
            matches: Vec::new(),
            failed_sources: Vec::new(),
        };
        for (entry, outcome) in catalog.iter().zip(outcomes) {
            match outcome {
                TableOutcome::Matched(found) => resolution.matches.extend(found),
                TableOutcome::Empty | TableOutcome::NotApplicable => {}
                TableOutcome::Failed(e) => {
                    warn!("Name lookup on '{}' failed: {}", entry.name, e);
                    resolution.failed_sources.push(SourceFailure {
                        table: entry.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        debug!(
            "'{}': {} matches, {} failed tables",
            resolution.query,
            resolution.matches.len(),
            resolution.failed_sources.len()
        );
        Ok(resolution)
    }

    async fn search_table(&self, entry: &TableEntry, needle: &str) -> TableOutcome<Vec<NameMatch>> {
        if !entry.capabilities.supports_name_search() {
            return TableOutcome::NotApplicable;
        }

        let has_scientific = entry.capabilities.has_scientific_name;
        let has_source = entry.has_column(columns::SOURCE);

        let mut projection = vec![columns::COMMON_NAME];
        if has_scientific {
            projection.push(columns::SCIENTIFIC_NAME);
        }
        projection.push(columns::PLANT_ID);
        if has_source {
            projection.push(columns::SOURCE);
        }

        let query = TableQuery::contains(columns::COMMON_NAME, needle)
            .select(projection)
            .distinct();

        let rows = match self.store.query(&entry.name, &query).await {
            Ok(rows) if rows.is_empty() => return TableOutcome::Empty,
            Ok(rows) => rows,
            Err(e) => return TableOutcome::Failed(e),
        };

        let matches = rows
            .into_records()
            .into_iter()
            .filter_map(|record| {
                let text = |name: &str| record.get(name).and_then(cell_text);
                Some(NameMatch {
                    common_name: text(columns::COMMON_NAME)?,
                    scientific_name: text(columns::SCIENTIFIC_NAME),
                    plant_id: text(columns::PLANT_ID),
                    source_table: entry.name.clone(),
                    citation: text(columns::SOURCE),
                })
            })
            .collect();
        TableOutcome::Matched(matches)
    }

    /// Every row carrying `plant_id`, from every table that has the column
    ///
    /// The canonical section is always present (rows or a not-found marker).
    /// Other tables appear only when they hold matching rows or failed.
    pub async fn get_full_record(&self, plant_id: &str) -> Result<FullRecord, LookupError> {
        let plant_id = required(plant_id, "plant_id")?.to_string();
        let catalog = self.discover().await?;

        let canonical = match self
            .store
            .query(
                columns::CANONICAL_TABLE,
                &TableQuery::equals(columns::PLANT_ID, plant_id.as_str()),
            )
            .await
        {
            Ok(rows) if rows.is_empty() => Section::NotFound {
                message: format!("{} not found in {}", plant_id, columns::CANONICAL_TABLE),
            },
            Ok(rows) => Section::Rows(rows.into_records()),
            Err(e) => {
                warn!("Canonical lookup for {} failed: {}", plant_id, e);
                Section::Error { error: e.to_string() }
            }
        };

        let others: Vec<&TableEntry> = catalog
            .iter()
            .filter(|entry| entry.name != columns::CANONICAL_TABLE)
            .collect();
        let outcomes = join_all(others.iter().map(|entry| self.fetch_rows(entry, &plant_id))).await;

        let mut sections = BTreeMap::new();
        sections.insert(columns::CANONICAL_TABLE.to_string(), canonical);
        for (entry, outcome) in others.into_iter().zip(outcomes) {
            match outcome {
                TableOutcome::Matched(rows) => {
                    sections.insert(entry.name.clone(), Section::Rows(rows));
                }
                TableOutcome::Empty | TableOutcome::NotApplicable => {}
                TableOutcome::Failed(e) => {
                    warn!("Full record lookup on '{}' failed: {}", entry.name, e);
                    sections.insert(entry.name.clone(), Section::Error { error: e.to_string() });
                }
            }
        }

        Ok(FullRecord { plant_id, sections })
    }

    async fn fetch_rows(&self, entry: &TableEntry, plant_id: &str) -> TableOutcome<Vec<Record>> {
        if !entry.capabilities.has_plant_id {
            return TableOutcome::NotApplicable;
        }
        match self
            .store
            .query(&entry.name, &TableQuery::equals(columns::PLANT_ID, plant_id))
            .await
        {
            Ok(rows) if rows.is_empty() => TableOutcome::Empty,
            Ok(rows) => TableOutcome::Matched(rows.into_records()),
            Err(e) => TableOutcome::Failed(e),
        }
    }
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str, LookupError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LookupError::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use casita_common::db::RowFilter;
    use casita_common::model::{ColumnCapabilities, RowSet, SourceTable};
    use casita_common::Result;
    use serde_json::{json, Value};
    use std::collections::HashSet;

    /// In-memory store; tables named in `broken` fail every query
    #[derive(Default)]
    struct MemoryStore {
        tables: Vec<SourceTable>,
        broken: HashSet<String>,
        catalog_error: bool,
        catalog_delay: Option<Duration>,
    }

    #[async_trait]
    impl TableStore for MemoryStore {
        async fn catalog(&self) -> Result<Vec<TableEntry>> {
            if let Some(delay) = self.catalog_delay {
                tokio::time::sleep(delay).await;
            }
            if self.catalog_error {
                return Err(Error::Internal("registry missing".to_string()));
            }
            Ok(self
                .tables
                .iter()
                .map(|t| TableEntry {
                    name: t.name.clone(),
                    columns: t.columns.clone(),
                    capabilities: ColumnCapabilities::from_columns(&t.columns),
                    row_count: t.rows.len() as i64,
                })
                .collect())
        }

        async fn query(&self, table: &str, query: &TableQuery) -> Result<RowSet> {
            if self.broken.contains(table) {
                return Err(Error::Internal(format!("{} is corrupted", table)));
            }
            let source = self
                .tables
                .iter()
                .find(|t| t.name == table)
                .ok_or_else(|| Error::NotFound(table.to_string()))?;

            let keep = |row: &Vec<Value>| match &query.filter {
                RowFilter::All => true,
                RowFilter::Equals { column, value } => source
                    .column_index(column)
                    .map(|i| row[i].as_str() == Some(value.as_str()))
                    .unwrap_or(false),
                RowFilter::ContainsIgnoreCase { column, needle } => source
                    .column_index(column)
                    .and_then(|i| row[i].as_str())
                    .map(|s| s.to_lowercase().contains(&needle.to_lowercase()))
                    .unwrap_or(false),
            };

            let columns = query.columns.clone().unwrap_or_else(|| source.columns.clone());
            let mut rows: Vec<Vec<Value>> = Vec::new();
            for row in source.rows.iter().filter(|r| keep(r)) {
                let projected: Vec<Value> = columns
                    .iter()
                    .map(|c| source.column_index(c).map(|i| row[i].clone()).unwrap_or(Value::Null))
                    .collect();
                if !query.distinct || !rows.contains(&projected) {
                    rows.push(projected);
                }
            }
            Ok(RowSet { columns, rows })
        }

        async fn write_snapshot(&self, _tables: &[SourceTable]) -> Result<()> {
            Err(Error::Internal("read-only".to_string()))
        }
    }

    fn table(name: &str, cols: &[&str], rows: Vec<Vec<Value>>) -> SourceTable {
        SourceTable::with_rows(name, cols.iter().map(|s| s.to_string()).collect(), rows).unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore {
            tables: vec![
                table(
                    "plant_base",
                    &["plant_id", "scientific_name", "canonical_label"],
                    vec![
                        vec![json!("P0001"), json!("allium sativum"), json!("allium sativum")],
                        vec![json!("P0002"), json!("malus domestica"), json!("malus domestica")],
                    ],
                ),
                table(
                    "huerta__hortalizas",
                    &["common_name", "scientific_name", "source", "plant_id"],
                    vec![
                        vec![json!("Ajo"), json!("allium sativum"), json!("Huerta (Sheet: hortalizas)"), json!("P0001")],
                        vec![json!("Ajo"), json!("allium sativum"), json!("Huerta (Sheet: hortalizas)"), json!("P0001")],
                        vec![json!("Ajo chino"), json!("allium tuberosum"), json!("Huerta (Sheet: hortalizas)"), Value::Null],
                    ],
                ),
                table(
                    "huerta__calendario",
                    &["common_name", "month"],
                    vec![vec![json!("Ajo"), json!("Mayo")]],
                ),
                table(
                    "frutales",
                    &["common_name", "scientific_name", "plant_id"],
                    vec![vec![json!("Manzano"), json!("malus domestica"), json!("P0002")]],
                ),
            ],
            ..Default::default()
        }
    }

    fn broken_store(table: &str) -> MemoryStore {
        let mut store = store();
        store.broken.insert(table.to_string());
        store
    }

    fn lookup(store: MemoryStore) -> FederatedLookup<MemoryStore> {
        FederatedLookup::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_resolve_skips_tables_without_plant_id() {
        let result = lookup(store()).resolve_by_common_name("AJO").await.unwrap();

        assert_eq!(result.query, "AJO");
        assert_eq!(result.matches.len(), 2, "duplicates collapsed");
        assert_eq!(result.matches[0].common_name, "Ajo");
        assert_eq!(result.matches[0].plant_id.as_deref(), Some("P0001"));
        assert_eq!(result.matches[0].source_table, "huerta__hortalizas");
        assert_eq!(
            result.matches[0].citation.as_deref(),
            Some("Huerta (Sheet: hortalizas)")
        );
        assert_eq!(result.matches[1].plant_id, None);
        assert!(result.failed_sources.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_not_found_distinct_from_failure() {
        let result = lookup(broken_store("frutales")).resolve_by_common_name("zapallo").await.unwrap();

        assert!(result.is_not_found());
        assert_eq!(result.failed_sources.len(), 1);
        assert_eq!(result.failed_sources[0].table, "frutales");
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let err = lookup(store()).resolve_by_common_name("   ").await.unwrap_err();
        assert!(matches!(err, LookupError::InvalidInput(_)));

        let err = lookup(store()).get_full_record("").await.unwrap_err();
        assert!(matches!(err, LookupError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_full_record_omits_empty_tables() {
        let record = lookup(store()).get_full_record(" P0002 ").await.unwrap();

        assert_eq!(record.plant_id, "P0002");
        let names: Vec<&str> = record.sections.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["frutales", "plant_base"]);
        match &record.sections["frutales"] {
            Section::Rows(rows) => assert_eq!(rows[0]["common_name"], json!("Manzano")),
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_full_record_unknown_id_marks_canonical_not_found() {
        let record = lookup(store()).get_full_record("P9999").await.unwrap();

        assert_eq!(record.sections.len(), 1);
        assert!(matches!(
            record.sections["plant_base"],
            Section::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_full_record_isolates_broken_table() {
        let record = lookup(broken_store("huerta__hortalizas")).get_full_record("P0001").await.unwrap();

        assert!(matches!(
            record.sections["huerta__hortalizas"],
            Section::Error { .. }
        ));
        assert!(matches!(record.sections["plant_base"], Section::Rows(_)));
        assert!(!record.sections.contains_key("frutales"));
    }

    #[tokio::test]
    async fn test_canonical_failure_is_a_section_error() {
        let record = lookup(broken_store("plant_base"))
            .get_full_record("P0001")
            .await
            .unwrap();
        assert!(matches!(record.sections["plant_base"], Section::Error { .. }));
        assert!(matches!(record.sections["huerta__hortalizas"], Section::Rows(_)));

        let err = lookup(broken_store("plant_base")).list_plants().await.unwrap_err();
        assert!(matches!(err, LookupError::Canonical(_)));
    }

    #[tokio::test]
    async fn test_discovery_failure_is_total() {
        let failing = MemoryStore {
            catalog_error: true,
            ..store()
        };
        let err = lookup(failing).resolve_by_common_name("ajo").await.unwrap_err();
        assert!(matches!(err, LookupError::Discovery(_)));
    }

    #[tokio::test]
    async fn test_discovery_timeout() {
        let slow = MemoryStore {
            catalog_delay: Some(Duration::from_millis(200)),
            ..store()
        };
        let lookup = lookup(slow).with_discovery_timeout(Duration::from_millis(10));
        let err = lookup.get_full_record("P0001").await.unwrap_err();
        assert!(matches!(err, LookupError::DiscoveryTimeout(_)));
    }

    #[tokio::test]
    async fn test_get_plant_and_list() {
        let lookup = lookup(store());
        assert_eq!(lookup.list_plants().await.unwrap().len(), 2);

        let plant = lookup.get_plant("P0001").await.unwrap().unwrap();
        assert_eq!(plant.scientific_name, "allium sativum");
        assert!(lookup.get_plant("P0404").await.unwrap().is_none());
    }
}
