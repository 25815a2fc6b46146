//! # Casita Common Library
//!
//! Shared code for the Casita de Semillas services including:
//! - Table data model (source tables, canonical plant records, column capabilities)
//! - Storage layer (`TableStore` trait and its SQLite implementation)
//! - Configuration loading and root folder resolution
//! - Logging initialization
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;

pub use error::{Error, Result};
pub use model::{ColumnCapabilities, PlantRecord, SourceTable, TableEntry};
