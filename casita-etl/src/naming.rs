//! Storage names for logical tables
//!
//! Logical names look like `"Tablas_Bosquimanxs.xlsx / frutales → common_name"`;
//! stored names are `"tablas_bosquimanxs__frutales__common_name"`. Distinct
//! logical names can collapse onto one stored name, so every assignment goes
//! through [`TableNamer`], which refuses collisions instead of overwriting.

use crate::relational::RELATION_SEPARATOR;
use casita_common::model::columns;
use casita_common::{Error, Result};
use std::collections::HashMap;

/// Spreadsheet/export extensions stripped from logical names
const STRIPPED_EXTENSIONS: &[&str] = &[".xlsx", ".xls", ".ods", ".csv", ".json"];

/// Separator between workbook label and sheet in logical names
pub const SHEET_SEPARATOR: &str = " / ";

/// Logical name of a loaded sheet
pub fn sheet_table_name(label: &str, sheet: &str) -> String {
    format!("{}{}{}", label, SHEET_SEPARATOR, sheet)
}

/// Normalize a logical table name for storage
pub fn normalize_table_name(logical: &str) -> String {
    let mut name = logical.to_string();
    for ext in STRIPPED_EXTENSIONS {
        name = name.replace(ext, "");
    }
    name.replace(SHEET_SEPARATOR, "__")
        .replace(RELATION_SEPARATOR, "__")
        .replace(' ', "_")
        .to_lowercase()
}

/// Hands out stored names, rejecting collisions
#[derive(Debug, Default)]
pub struct TableNamer {
    /// Stored name → logical name that claimed it
    claimed: HashMap<String, String>,
}

impl TableNamer {
    /// Namer with the canonical and registry tables pre-claimed
    pub fn new() -> Self {
        let mut namer = Self::default();
        for reserved in [columns::CANONICAL_TABLE, columns::REGISTRY_TABLE] {
            namer.claimed.insert(reserved.to_string(), reserved.to_string());
        }
        namer
    }

    /// Claim the stored name for `logical`
    ///
    /// Fails with [`Error::NameCollision`] when a different logical name (or a
    /// reserved table) already owns it.
    pub fn claim(&mut self, logical: &str) -> Result<String> {
        let normalized = normalize_table_name(logical);
        if let Some(first) = self.claimed.get(&normalized) {
            return Err(Error::NameCollision {
                first: first.clone(),
                second: logical.to_string(),
                normalized,
            });
        }
        self.claimed.insert(normalized.clone(), logical.to_string());
        Ok(normalized)
    }
}
