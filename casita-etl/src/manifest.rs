//! Ingestion manifest
//!
//! TOML file naming the workbooks to load and how to treat their columns:
//!
//! ```toml
//! similarity_threshold = 90.0
//! delimited_columns = ["common_name", "effects"]
//!
//! [column_aliases]
//! nombre_comun = "common_name"
//! nombre_cientifico = "scientific_name"
//!
//! [[source]]
//! label = "Tablas_Bosquimanxs.xlsx"
//! path = "data/Tablas_Bosquimanxs.json"
//! citation = "Bosquimanxs (2017) Bosquímanos."
//!
//! [[relational]]
//! table = "Tablas_Bosquimanxs.xlsx / frutales"
//! columns = ["common_name"]
//! ```

use casita_common::model::columns;
use casita_common::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct IngestManifest {
    /// Overrides `[etl] similarity_threshold` from the config file
    pub similarity_threshold: Option<f64>,

    /// Columns whose cells hold `;`-delimited lists
    #[serde(default = "default_delimited_columns")]
    pub delimited_columns: Vec<String>,

    /// Source header → well-known column name
    #[serde(default)]
    pub column_aliases: HashMap<String, String>,

    #[serde(default, rename = "source")]
    pub sources: Vec<SourceSpec>,

    #[serde(default)]
    pub relational: Vec<RelationalSpec>,
}

/// One workbook to load
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    /// Workbook label used in table names; defaults to the file name
    pub label: Option<String>,
    pub path: PathBuf,
    /// Bibliographic citation recorded in the `source` column
    pub citation: Option<String>,
}

impl SourceSpec {
    pub fn label(&self) -> String {
        self.label.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string())
        })
    }

    /// Citation, falling back to the label
    pub fn citation(&self) -> String {
        self.citation.clone().unwrap_or_else(|| self.label())
    }
}

/// Delimited columns of one logical table to explode
#[derive(Debug, Clone, Deserialize)]
pub struct RelationalSpec {
    /// Logical table name, `"<label> / <sheet>"`
    pub table: String,
    pub columns: Vec<String>,
}

fn default_delimited_columns() -> Vec<String> {
    vec![columns::COMMON_NAME.to_string()]
}

impl IngestManifest {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let manifest: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid manifest: {}", e)))?;

        if let Some(threshold) = manifest.similarity_threshold {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(Error::Config(format!(
                    "similarity_threshold must be within 0-100, got {}",
                    threshold
                )));
            }
        }
        Ok(manifest)
    }

    /// Load a manifest; relative source paths resolve against its directory
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read manifest {}: {}", path.display(), e)))?;
        let mut manifest = Self::from_toml_str(&content)?;

        if let Some(base) = path.parent() {
            for source in &mut manifest.sources {
                if source.path.is_relative() {
                    source.path = base.join(&source.path);
                }
            }
        }
        Ok(manifest)
    }
}
