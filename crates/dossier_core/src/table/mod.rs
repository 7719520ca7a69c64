//! Whole-table persistence contract for the record store.
//!
//! # Responsibility
//! - Describe the durable table as ordered rows of named string cells.
//! - Keep storage formats behind the [`TableStore`] trait.
//!
//! # Invariants
//! - `save_table` replaces the entire persisted table; there are no row-level
//!   writes.
//! - `update_table` reads and replaces under one storage-level lock, so
//!   writers in other stores or processes cannot interleave with it.
//! - Row order is preserved across a save/load cycle.
//! - A missing cell is distinct from an empty one and survives round trips.

use crate::db::DbError;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryTable;
pub use sqlite::SqliteTable;

/// Column holding the record identifier.
pub const COLUMN_IDENTIFIER: &str = "identifier";
/// Column holding the human display name.
pub const COLUMN_DISPLAY_NAME: &str = "display_name";
/// Column holding newline-joined note lines. May be absent on first load.
pub const COLUMN_NOTES: &str = "notes";

pub type TableResult<T> = Result<T, TableError>;

/// Error raised by table storage backends.
#[derive(Debug)]
pub enum TableError {
    Db(DbError),
    /// Persisted bytes could not be decoded into rows.
    Encoding(serde_json::Error),
    InvalidData(String),
}

impl Display for TableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Encoding(err) => write!(f, "invalid table encoding: {err}"),
            Self::InvalidData(message) => write!(f, "invalid table data: {message}"),
        }
    }
}

impl Error for TableError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encoding(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for TableError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for TableError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for TableError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encoding(value)
    }
}

/// One table row: named cells, absent cells are simply not present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRow {
    cells: BTreeMap<String, String>,
}

impl TableRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style cell setter.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.insert(column.into(), value.into());
    }

    pub fn into_cells(self) -> BTreeMap<String, String> {
        self.cells
    }
}

impl From<BTreeMap<String, String>> for TableRow {
    fn from(cells: BTreeMap<String, String>) -> Self {
        Self { cells }
    }
}

/// Ordered snapshot of the whole persisted table.
pub type Table = Vec<TableRow>;

/// Persistence collaborator consumed by [`crate::repo::RecordStore`].
///
/// Implementations must be safe to share across threads.
pub trait TableStore: Send + Sync {
    /// Reads every row in table order.
    fn load_table(&self) -> TableResult<Table>;

    /// Replaces the persisted table with `rows`, atomically.
    fn save_table(&self, rows: &[TableRow]) -> TableResult<()>;

    /// Loads the table, lets `apply` edit it, then saves the result.
    ///
    /// The whole cycle is exclusive against every other `update_table` or
    /// `save_table` on the same storage. When `apply` fails nothing is saved
    /// and its error is returned unchanged.
    fn update_table<R, E, F>(&self, apply: F) -> Result<R, E>
    where
        F: FnOnce(&mut Table) -> Result<R, E>,
        E: From<TableError>;
}
