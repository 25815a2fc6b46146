//! Header and cell text cleanup
//!
//! Pure string transforms applied to each sheet before anything else looks at
//! it. Nothing here looks across rows.

use casita_common::model::columns;
use casita_common::{Error, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Cleans one cell's text given the column it sits in
pub trait CellNormalizer {
    fn normalize(&self, column: &str, text: &str) -> String;

    /// Apply to a JSON cell; only strings are touched
    fn normalize_value(&self, column: &str, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.normalize(column, &s)),
            other => other,
        }
    }
}

/// Default cleanup rules
///
/// - whitespace runs collapse to one space, cell trimmed
/// - in delimited columns, runs of `,` `;` `/` become a single `;` with no
///   surrounding spaces and no leading/trailing `;`
/// - `scientific_name` is lower-cased; every other column is capitalized per
///   `;`-separated part
#[derive(Debug, Clone)]
pub struct StandardCellNormalizer {
    delimited_columns: HashSet<String>,
}

impl Default for StandardCellNormalizer {
    fn default() -> Self {
        Self::new([columns::COMMON_NAME])
    }
}

impl StandardCellNormalizer {
    pub fn new<I, S>(delimited_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            delimited_columns: delimited_columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl CellNormalizer for StandardCellNormalizer {
    fn normalize(&self, column: &str, text: &str) -> String {
        let mut cleaned = collapse_whitespace(text);

        if self.delimited_columns.contains(column) {
            cleaned = normalize_delimiters(&cleaned);
        }

        if column == columns::SCIENTIFIC_NAME {
            cleaned.to_lowercase()
        } else {
            cleaned
                .split(';')
                .map(|part| capitalize(part.trim()))
                .collect::<Vec<_>>()
                .join(";")
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `"Ajo, ajo blanco / Ajo chino;;"` → `"Ajo;ajo blanco;Ajo chino"`
fn normalize_delimiters(text: &str) -> String {
    text.split(|c| c == ',' || c == ';' || c == '/')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(";")
}

/// First char upper-case, the rest lower-case
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Clean a sheet's header row
///
/// Headers are trimmed and renamed through `aliases`. Empty headers are dropped;
/// the returned indices say which source columns survive. Duplicate headers
/// (after aliasing) make the sheet unusable.
pub fn normalize_headers(
    headers: &[String],
    aliases: &HashMap<String, String>,
) -> Result<(Vec<String>, Vec<usize>)> {
    let mut names = Vec::new();
    let mut keep = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw) in headers.iter().enumerate() {
        let trimmed = collapse_whitespace(raw);
        if trimmed.is_empty() {
            continue;
        }
        let name = aliases.get(&trimmed).cloned().unwrap_or(trimmed);
        if !seen.insert(name.clone()) {
            return Err(Error::InvalidInput(format!("duplicate column '{}'", name)));
        }
        names.push(name);
        keep.push(idx);
    }

    Ok((names, keep))
}
