//! SQLite-backed table file.
//!
//! # Responsibility
//! - Persist the record table as one SQLite file, one SQL row per table row.
//! - Keep columns beyond the well-known three in a JSON object column.
//!
//! # Invariants
//! - `save_table` runs as a single `IMMEDIATE` transaction: readers see either
//!   the previous snapshot or the new one, never a mix.
//! - `update_table` reads inside that same transaction, so concurrent writers
//!   on the file (other stores, other processes) queue behind each other on
//!   the SQLite write lock instead of overwriting each other.
//! - Rows are reloaded in the order they were saved (`position`).
//! - Every saved row carries an `identifier` cell.

use super::{
    Table, TableError, TableResult, TableRow, TableStore, COLUMN_DISPLAY_NAME, COLUMN_IDENTIFIER,
    COLUMN_NOTES,
};
use crate::db::open_db;
use log::{debug, error};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Table stored in a SQLite file, opened per call.
#[derive(Debug, Clone)]
pub struct SqliteTable {
    path: PathBuf,
}

impl SqliteTable {
    /// Opens (creating and migrating if needed) the table file at `path`.
    pub fn open(path: impl AsRef<Path>) -> TableResult<Self> {
        let path = path.as_ref().to_path_buf();
        open_db(&path)?;
        Ok(Self { path })
    }

    fn connect(&self) -> TableResult<Connection> {
        Ok(open_db(&self.path)?)
    }
}

impl TableStore for SqliteTable {
    fn load_table(&self) -> TableResult<Table> {
        let conn = self.connect()?;
        read_rows(&conn)
    }

    fn save_table(&self, rows: &[TableRow]) -> TableResult<()> {
        let started_at = Instant::now();
        let mut conn = self.connect()?;
        let result = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(TableError::from)
            .and_then(|tx| {
                replace_rows(&tx, rows)?;
                tx.commit()?;
                Ok(())
            });
        log_save("table_save", rows.len(), started_at, &result);
        result
    }

    fn update_table<R, E, F>(&self, apply: F) -> Result<R, E>
    where
        F: FnOnce(&mut Table) -> Result<R, E>,
        E: From<TableError>,
    {
        let started_at = Instant::now();
        let mut conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(TableError::from)?;

        let mut rows = read_rows(&tx)?;
        let output = apply(&mut rows)?;

        let result = replace_rows(&tx, &rows).and_then(|()| tx.commit().map_err(TableError::from));
        log_save("table_update", rows.len(), started_at, &result);
        result?;
        Ok(output)
    }
}

fn log_save(event: &str, rows: usize, started_at: Instant, result: &TableResult<()>) {
    match result {
        Ok(()) => debug!(
            "event={event} module=table status=ok rows={rows} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!("event={event} module=table status=error rows={rows} error={err}"),
    }
}

fn read_rows(conn: &Connection) -> TableResult<Table> {
    let mut stmt = conn.prepare(
        "SELECT identifier, display_name, notes, extra_json
         FROM record_rows
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut table = Vec::new();

    while let Some(row) = rows.next()? {
        let extra_json: String = row.get("extra_json")?;
        let mut cells: BTreeMap<String, String> = serde_json::from_str(&extra_json)?;
        cells.insert(COLUMN_IDENTIFIER.to_string(), row.get("identifier")?);
        if let Some(name) = row.get::<_, Option<String>>("display_name")? {
            cells.insert(COLUMN_DISPLAY_NAME.to_string(), name);
        }
        if let Some(notes) = row.get::<_, Option<String>>("notes")? {
            cells.insert(COLUMN_NOTES.to_string(), notes);
        }
        table.push(TableRow::from(cells));
    }

    Ok(table)
}

/// Replaces every stored row. Runs inside the caller's transaction.
fn replace_rows(tx: &Transaction<'_>, rows: &[TableRow]) -> TableResult<()> {
    tx.execute("DELETE FROM record_rows;", [])?;

    let mut insert = tx.prepare(
        "INSERT INTO record_rows (position, identifier, display_name, notes, extra_json)
         VALUES (?1, ?2, ?3, ?4, ?5);",
    )?;
    for (position, row) in rows.iter().enumerate() {
        let mut cells = row.clone().into_cells();
        let identifier = cells.remove(COLUMN_IDENTIFIER).ok_or_else(|| {
            TableError::InvalidData(format!("row {position} has no `{COLUMN_IDENTIFIER}` cell"))
        })?;
        let display_name = cells.remove(COLUMN_DISPLAY_NAME);
        let notes = cells.remove(COLUMN_NOTES);
        let extra_json = serde_json::to_string(&cells)?;
        let position = i64::try_from(position).map_err(|_| {
            TableError::InvalidData(format!("row position {position} out of range"))
        })?;

        insert.execute(params![position, identifier, display_name, notes, extra_json])?;
    }

    Ok(())
}
