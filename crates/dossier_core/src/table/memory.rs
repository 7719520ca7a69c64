//! In-process table backend.
//!
//! Used by tests and by callers that persist elsewhere. The row mutex is held
//! across a whole `update_table` cycle.

use super::{Table, TableError, TableResult, TableRow, TableStore};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct MemoryTable {
    rows: Mutex<Table>,
    fail_next_save: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryTable {
    /// Creates a table pre-populated with `rows`.
    pub fn with_rows(rows: Table) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    /// Test hook: makes the next save fail without touching the rows.
    ///
    /// Applies to both `save_table` and `update_table`. Not meant for
    /// production callers.
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Copy of the currently persisted rows.
    pub fn snapshot(&self) -> Table {
        self.rows.lock().clone()
    }

    fn take_injected_failure(&self) -> TableResult<()> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(TableError::InvalidData(
                "injected save failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl TableStore for MemoryTable {
    fn load_table(&self) -> TableResult<Table> {
        Ok(self.rows.lock().clone())
    }

    fn save_table(&self, rows: &[TableRow]) -> TableResult<()> {
        let mut current = self.rows.lock();
        self.take_injected_failure()?;
        *current = rows.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn update_table<R, E, F>(&self, apply: F) -> Result<R, E>
    where
        F: FnOnce(&mut Table) -> Result<R, E>,
        E: From<TableError>,
    {
        let mut current = self.rows.lock();
        let mut next = current.clone();
        let output = apply(&mut next)?;

        self.take_injected_failure()?;
        *current = next;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryTable;
    use crate::table::{TableError, TableRow, TableStore, COLUMN_IDENTIFIER};

    #[test]
    fn injected_failure_leaves_rows_untouched() {
        let table = MemoryTable::with_rows(vec![TableRow::new().with(COLUMN_IDENTIFIER, "A1")]);
        table.fail_next_save();

        table
            .save_table(&[])
            .expect_err("injected failure should surface");
        assert_eq!(table.load_table().expect("load").len(), 1);
        assert_eq!(table.save_count(), 0);

        table.save_table(&[]).expect("next save succeeds");
        assert!(table.snapshot().is_empty());
    }

    #[test]
    fn failed_update_discards_edits() {
        let table = MemoryTable::with_rows(vec![TableRow::new().with(COLUMN_IDENTIFIER, "A1")]);

        let result: Result<(), TableError> = table.update_table(|rows| {
            rows.clear();
            Err(TableError::InvalidData("rejected".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(table.snapshot().len(), 1);
        assert_eq!(table.save_count(), 0);

        let added: Result<usize, TableError> = table.update_table(|rows| {
            rows.push(TableRow::new().with(COLUMN_IDENTIFIER, "B2"));
            Ok(rows.len())
        });
        assert_eq!(added.expect("update"), 2);
        assert_eq!(table.save_count(), 1);
    }
}
