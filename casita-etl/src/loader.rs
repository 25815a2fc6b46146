//! Workbook loading
//!
//! A workbook is a file holding one or more named sheets, each a header row
//! plus data rows. Spreadsheets are exported to the JSON layout below before
//! ingestion:
//!
//! ```json
//! {"sheets": [{"name": "frutales",
//!              "columns": ["nombre_comun", "nombre_cientifico"],
//!              "rows": [["Ajo", "Allium sativum"]]}]}
//! ```

use casita_common::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// One sheet as delivered by a loader, before any cleanup
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawSheet {
    pub name: String,
    #[serde(rename = "columns")]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

/// Reads every sheet of a workbook file
pub trait SheetLoader {
    fn load(&self, path: &Path) -> Result<Vec<RawSheet>>;
}

#[derive(Debug, Deserialize)]
struct JsonWorkbook {
    sheets: Vec<RawSheet>,
}

/// Loads the JSON workbook layout
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWorkbookLoader;

impl JsonWorkbookLoader {
    pub fn parse(content: &str) -> Result<Vec<RawSheet>> {
        let workbook: JsonWorkbook = serde_json::from_str(content)?;
        for sheet in &workbook.sheets {
            if sheet.name.trim().is_empty() {
                return Err(Error::InvalidInput("sheet with empty name".to_string()));
            }
        }
        Ok(workbook.sheets)
    }
}

impl SheetLoader for JsonWorkbookLoader {
    fn load(&self, path: &Path) -> Result<Vec<RawSheet>> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_workbook() {
        let sheets = JsonWorkbookLoader::parse(
            r#"{"sheets": [
                {"name": "frutales", "columns": ["nombre_comun", "altura"],
                 "rows": [["Manzano", 4], ["Peral", null]]},
                {"name": "vacia", "columns": ["x"]}
            ]}"#,
        )
        .unwrap();

        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].headers, vec!["nombre_comun", "altura"]);
        assert_eq!(sheets[0].rows[0], vec![json!("Manzano"), json!(4)]);
        assert!(sheets[1].rows.is_empty());
    }

    #[test]
    fn test_malformed_workbook_rejected() {
        assert!(JsonWorkbookLoader::parse(r#"{"sheets": "nope"}"#).is_err());
        assert!(JsonWorkbookLoader::parse(r#"{"sheets": [{"name": " ", "columns": []}]}"#).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = JsonWorkbookLoader.load(Path::new("/nonexistent/workbook.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
