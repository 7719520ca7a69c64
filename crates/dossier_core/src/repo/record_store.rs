//! Record store: substring search and append-only annotation.
//!
//! # Responsibility
//! - Answer filtered lookups over the persisted table in table order.
//! - Append note entries with store-assigned timestamps.
//!
//! # Invariants
//! - Every mutation is one `TableStore::update_table` cycle, so concurrent
//!   appends never lose each other's entries, even across stores or processes
//!   sharing the same storage.
//! - Mutation targeting uses whole-identifier match (first match wins);
//!   search uses substring match.
//! - Rows with a blank identifier are skipped by reads and kept untouched by
//!   writes.
//! - A mutation rewrites only the row it targets. Stored identifier text is
//!   never normalized.

use crate::model::record::{identifiers_match, NoteEntry, NoteLog, Record, RecordValidationError};
use crate::search::filter::RecordFilter;
use crate::table::{
    Table, TableError, TableRow, TableStore, COLUMN_DISPLAY_NAME, COLUMN_IDENTIFIER, COLUMN_NOTES,
};
use chrono::{Local, NaiveDateTime};
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Error returned by record store operations.
#[derive(Debug)]
pub enum StoreError {
    Validation(RecordValidationError),
    /// No record has exactly this identifier.
    NotFound(String),
    Table(TableError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(identifier) => write!(f, "record not found: {identifier}"),
            Self::Table(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Table(err) => Some(err),
            Self::NotFound(_) => None,
        }
    }
}

impl From<RecordValidationError> for StoreError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<TableError> for StoreError {
    fn from(value: TableError) -> Self {
        Self::Table(value)
    }
}

/// Durable record table; all coordination lives in the table backend.
pub struct RecordStore<T: TableStore> {
    table: T,
    clock: fn() -> NaiveDateTime,
}

impl<T: TableStore> RecordStore<T> {
    /// Opens a store over `table`, checking the persisted rows once.
    ///
    /// Duplicate identifiers are tolerated; mutations target the first one.
    /// Rows with a blank identifier are tolerated and never returned.
    pub fn open(table: T) -> StoreResult<Self> {
        let rows = table.load_table()?;
        let total = rows.len();
        let records = records_from_rows(rows);
        let skipped = total - records.len();
        let duplicates = count_duplicate_identifiers(&records);

        if skipped > 0 || duplicates > 0 {
            warn!(
                "event=store_open module=repo status=degraded records={} skipped_rows={} duplicate_identifiers={}",
                records.len(),
                skipped,
                duplicates
            );
        } else {
            info!(
                "event=store_open module=repo status=ok records={}",
                records.len()
            );
        }

        Ok(Self {
            table,
            clock: local_now,
        })
    }

    /// Replaces the timestamp source used for new note entries.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Underlying persistence backend.
    pub fn table(&self) -> &T {
        &self.table
    }

    /// Returns records matching `filter`, in table order.
    ///
    /// An unrestricted filter returns every record. Zero matches is an empty
    /// vector, not an error.
    pub fn search(&self, filter: &RecordFilter) -> StoreResult<Vec<Record>> {
        Ok(self
            .load_records()?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect())
    }

    /// Returns the first record whose identifier equals `identifier`.
    pub fn get(&self, identifier: &str) -> StoreResult<Option<Record>> {
        Ok(self
            .load_records()?
            .into_iter()
            .find(|record| record.has_identifier(identifier)))
    }

    /// Number of records currently persisted.
    pub fn count(&self) -> StoreResult<usize> {
        Ok(self.load_records()?.len())
    }

    /// Appends one note entry to the record identified by `identifier`.
    ///
    /// Not idempotent: every call adds a new line with a fresh timestamp.
    ///
    /// # Errors
    /// - `Validation` when `author` or `body` is blank.
    /// - `NotFound` when no record has exactly this identifier.
    /// - `Table` when loading or saving fails; nothing is persisted then.
    pub fn append_note(&self, identifier: &str, author: &str, body: &str) -> StoreResult<Record> {
        let entry = NoteEntry::new((self.clock)(), author, body)?;
        let not_found = || StoreError::NotFound(identifier.trim().to_string());

        let (index, record) = self.table.update_table(|rows| -> StoreResult<_> {
            let index = position_of(rows, identifier).ok_or_else(not_found)?;
            let mut record = record_from_row(rows[index].clone()).ok_or_else(not_found)?;

            record.notes.append(&entry);
            rows[index] = record_to_row(&record);
            initialize_notes_column(rows);
            Ok((index, record))
        })?;

        info!(
            "event=note_append module=repo status=ok row={} entries={}",
            index,
            record.notes.entries().len()
        );
        Ok(record)
    }

    /// Adds a new record with an empty note log at the end of the table.
    ///
    /// # Errors
    /// - `Validation(EmptyIdentifier)` for a blank identifier.
    /// - `Validation(DuplicateIdentifier)` when the identifier already exists.
    pub fn insert_record(&self, identifier: &str, display_name: &str) -> StoreResult<Record> {
        let record = Record::new(identifier, display_name)?;

        let rows = self.table.update_table(|rows| -> StoreResult<_> {
            if position_of(rows, &record.identifier).is_some() {
                return Err(
                    RecordValidationError::DuplicateIdentifier(record.identifier.clone()).into(),
                );
            }
            rows.push(record_to_row(&record));
            Ok(rows.len())
        })?;

        info!("event=record_insert module=repo status=ok rows={rows}");
        Ok(record)
    }

    fn load_records(&self) -> StoreResult<Vec<Record>> {
        Ok(records_from_rows(self.table.load_table()?))
    }
}

fn records_from_rows(rows: Table) -> Vec<Record> {
    rows.into_iter().filter_map(record_from_row).collect()
}

/// Builds a record from a stored row; `None` when the identifier is blank.
fn record_from_row(row: TableRow) -> Option<Record> {
    let mut cells = row.into_cells();
    let identifier = cells
        .remove(COLUMN_IDENTIFIER)
        .filter(|value| !value.trim().is_empty())?;

    Some(Record {
        identifier,
        display_name: cells.remove(COLUMN_DISPLAY_NAME).unwrap_or_default(),
        notes: NoteLog::from_stored(cells.remove(COLUMN_NOTES)),
        extra: cells,
    })
}

fn record_to_row(record: &Record) -> TableRow {
    let mut row = TableRow::from(record.extra.clone());
    row.set(COLUMN_IDENTIFIER, record.identifier.as_str());
    row.set(COLUMN_DISPLAY_NAME, record.display_name.as_str());
    row.set(COLUMN_NOTES, record.notes.as_str());
    row
}

fn position_of(rows: &[TableRow], identifier: &str) -> Option<usize> {
    rows.iter().position(|row| {
        row.get(COLUMN_IDENTIFIER)
            .is_some_and(|stored| identifiers_match(stored, identifier))
    })
}

/// The notes column exists on every row once any note has been written.
fn initialize_notes_column(rows: &mut [TableRow]) {
    for row in rows.iter_mut().filter(|row| row.get(COLUMN_NOTES).is_none()) {
        row.set(COLUMN_NOTES, "");
    }
}

fn count_duplicate_identifiers(records: &[Record]) -> usize {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|record| !seen.insert(record.identifier.trim().to_lowercase()))
        .count()
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}
