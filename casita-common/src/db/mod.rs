//! Storage layer
//!
//! The services only ever see [`TableStore`]: enumerate the table catalog, run a
//! read against one named table, and replace the whole persisted snapshot.

pub mod init;
pub mod sqlite;
pub mod store;

pub use init::{connect_readonly, init_database};
pub use sqlite::{quote_ident, SqliteTableStore};
pub use store::{RowFilter, TableQuery, TableStore};
