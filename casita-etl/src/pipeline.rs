//! Ingestion pipeline
//!
//! Loads every configured workbook and turns the sheets into one snapshot:
//!
//! 1. headers aliased, cells normalized, `source` provenance column added
//! 2. `scientific_name` backfilled from the common name index
//! 3. scientific names clustered into plant identities
//! 4. every table with `scientific_name` annotated with `plant_id`
//! 5. configured delimited columns exploded into relational tables
//! 6. canonical table added, table names normalized for storage
//!
//! A sheet or workbook that fails is reported and skipped; the run goes on.
//! The finished snapshot replaces whatever the store held before.

use crate::backfill::{backfill_scientific_names, CommonNameIndex};
use crate::loader::{RawSheet, SheetLoader};
use crate::manifest::{IngestManifest, RelationalSpec, SourceSpec};
use crate::naming::{sheet_table_name, TableNamer};
use crate::normalize::{normalize_headers, CellNormalizer, StandardCellNormalizer};
use crate::relational::{explode_column, RELATION_SEPARATOR};
use crate::resolver::{annotate_tables, collect_scientific_names, IdentityResolver, Resolution};
use casita_common::db::TableStore;
use casita_common::model::{columns, SourceTable};
use casita_common::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

/// A table (or workbook) left out of the snapshot, and why
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedTable {
    pub table: String,
    pub reason: String,
}

/// Summary of one ingestion run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub sheets_loaded: usize,
    pub backfilled_tables: usize,
    pub distinct_names: usize,
    pub excluded_names: usize,
    pub clusters: usize,
    pub rows_without_identity: usize,
    /// Stored names of every table in the snapshot
    pub tables: Vec<String>,
    pub skipped: Vec<SkippedTable>,
}

impl IngestReport {
    fn skip(&mut self, table: impl Into<String>, reason: impl Into<String>) {
        let skipped = SkippedTable {
            table: table.into(),
            reason: reason.into(),
        };
        warn!("Skipping '{}': {}", skipped.table, skipped.reason);
        self.skipped.push(skipped);
    }
}

/// Output of [`Pipeline::run`]: tables ready to persist
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Canonical table first, then loaded and relational tables, all with stored names
    pub tables: Vec<SourceTable>,
    pub resolution: Resolution,
    pub report: IngestReport,
}

impl Snapshot {
    pub fn table(&self, name: &str) -> Option<&SourceTable> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Collects sheets and builds a [`Snapshot`]
pub struct Pipeline<N: CellNormalizer = StandardCellNormalizer> {
    normalizer: N,
    resolver: IdentityResolver,
    column_aliases: HashMap<String, String>,
    relational: Vec<RelationalSpec>,
    tables: Vec<SourceTable>,
    report: IngestReport,
}

impl Pipeline<StandardCellNormalizer> {
    /// Pipeline configured from a manifest
    ///
    /// `threshold` applies when the manifest doesn't set one.
    pub fn from_manifest(manifest: &IngestManifest, threshold: f64) -> Self {
        let mut pipeline = Pipeline::new(
            StandardCellNormalizer::new(manifest.delimited_columns.iter().cloned()),
            IdentityResolver::new(manifest.similarity_threshold.unwrap_or(threshold)),
        );
        pipeline.column_aliases = manifest.column_aliases.clone();
        pipeline.relational = manifest.relational.clone();
        pipeline
    }
}

impl<N: CellNormalizer> Pipeline<N> {
    pub fn new(normalizer: N, resolver: IdentityResolver) -> Self {
        Self {
            normalizer,
            resolver,
            column_aliases: HashMap::new(),
            relational: Vec::new(),
            tables: Vec::new(),
            report: IngestReport::default(),
        }
    }

    pub fn with_column_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.column_aliases = aliases;
        self
    }

    pub fn with_relational(mut self, relational: Vec<RelationalSpec>) -> Self {
        self.relational = relational;
        self
    }

    /// Load every sheet of one workbook
    ///
    /// A workbook that cannot be read is reported and skipped.
    pub fn add_workbook<L: SheetLoader>(&mut self, loader: &L, source: &SourceSpec) {
        let label = source.label();
        match loader.load(&source.path) {
            Ok(sheets) => {
                info!("Loaded {} sheets from {}", sheets.len(), source.path.display());
                for sheet in sheets {
                    self.add_sheet(&label, &source.citation(), sheet);
                }
            }
            Err(e) => self.report.skip(label, format!("cannot load workbook: {}", e)),
        }
    }

    /// Clean one sheet and queue it as `"<label> / <sheet>"`
    pub fn add_sheet(&mut self, label: &str, citation: &str, sheet: RawSheet) {
        let name = sheet_table_name(label, &sheet.name);
        match self.build_table(&name, citation, sheet) {
            Ok(table) => {
                self.report.sheets_loaded += 1;
                self.tables.push(table);
            }
            Err(e) => self.report.skip(name, e.to_string()),
        }
    }

    fn build_table(&self, name: &str, citation: &str, sheet: RawSheet) -> Result<SourceTable> {
        let (headers, keep) = normalize_headers(&sheet.headers, &self.column_aliases)?;
        let mut table = SourceTable::new(name, headers)?;

        for raw in sheet.rows {
            let row: Vec<Value> = keep
                .iter()
                .zip(&table.columns)
                .map(|(&idx, column)| {
                    let cell = raw.get(idx).cloned().unwrap_or(Value::Null);
                    self.normalizer.normalize_value(column, cell)
                })
                .collect();

            // Blank spreadsheet rows
            if row.iter().all(|v| v.is_null() || v.as_str() == Some("")) {
                continue;
            }
            table.push_row(row)?;
        }

        let provenance = Value::String(format!("{} (Sheet: {})", citation, sheet.name));
        table.set_column(columns::SOURCE, vec![provenance; table.rows.len()])?;
        Ok(table)
    }

    /// Resolve identities and assemble the snapshot
    pub fn run(self) -> Result<Snapshot> {
        let Self {
            resolver,
            relational,
            mut tables,
            mut report,
            ..
        } = self;

        let index = CommonNameIndex::build(&tables);
        report.backfilled_tables = backfill_scientific_names(&mut tables, &index)?;

        let resolution = resolver.resolve(collect_scientific_names(&tables));
        report.distinct_names = resolution.name_count();
        report.excluded_names = resolution.excluded_names();
        report.clusters = resolution.cluster_count();
        report.rows_without_identity = annotate_tables(&mut tables, &resolution)?;

        let mut derived = Vec::new();
        for spec in &relational {
            let Some(table) = tables.iter().find(|t| t.name == spec.table) else {
                report.skip(spec.table.clone(), "relational source table not loaded");
                continue;
            };
            for column in &spec.columns {
                let relation = format!("{}{}{}", spec.table, RELATION_SEPARATOR, column);
                match explode_column(table, column) {
                    Ok(Some(exploded)) => derived.push(exploded),
                    Ok(None) => report.skip(relation, "column or scientific_name missing"),
                    Err(e) => report.skip(relation, e.to_string()),
                }
            }
        }

        let mut snapshot_tables = vec![resolution.canonical_table()?];
        let mut namer = TableNamer::new();
        for mut table in tables.into_iter().chain(derived) {
            if table.is_empty() {
                report.skip(table.name, "no rows");
                continue;
            }
            match namer.claim(&table.name) {
                Ok(stored) => {
                    table.name = stored;
                    snapshot_tables.push(table);
                }
                Err(e) => report.skip(table.name, e.to_string()),
            }
        }

        report.tables = snapshot_tables.iter().map(|t| t.name.clone()).collect();
        info!(
            "Snapshot ready: {} tables, {} plants from {} names ({} rows without plant_id)",
            report.tables.len(),
            report.clusters,
            report.distinct_names,
            report.rows_without_identity
        );

        Ok(Snapshot {
            tables: snapshot_tables,
            resolution,
            report,
        })
    }
}

/// Replace the store's contents with the snapshot
pub async fn persist_snapshot<S: TableStore + ?Sized>(store: &S, snapshot: &Snapshot) -> Result<()> {
    store.write_snapshot(&snapshot.tables).await?;
    info!("Persisted {} tables", snapshot.tables.len());
    for skipped in &snapshot.report.skipped {
        warn!("Not persisted: '{}' ({})", skipped.table, skipped.reason);
    }
    Ok(())
}
