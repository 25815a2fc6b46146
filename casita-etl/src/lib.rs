//! casita-etl library - spreadsheet ingestion and plant identity resolution
//!
//! Turns independently authored plant spreadsheets into one SQLite snapshot in
//! which every table carrying a scientific name is annotated with a canonical
//! `plant_id`.

pub mod backfill;
pub mod loader;
pub mod manifest;
pub mod naming;
pub mod normalize;
pub mod pipeline;
pub mod relational;
pub mod resolver;

pub use pipeline::{persist_snapshot, IngestReport, Pipeline, Snapshot};
pub use resolver::{IdentityResolver, Resolution};
