//! Schema migrations for the record table database.
//!
//! # Invariants
//! - Versions are strictly increasing and never renumbered.
//! - The applied version lives in `PRAGMA user_version`.
//! - All pending steps commit together or not at all.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "record_rows",
    sql: include_str!("0001_init.sql"),
}];

/// Returns the newest schema version this build understands.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Reads the schema version stored in the database header.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Brings `conn` up to [`latest_version`].
///
/// Returns how many migration steps were applied.
///
/// # Errors
/// - `SchemaTooNew` when the file was written by a newer build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    let latest = latest_version();
    if schema_version(conn)? == latest {
        return Ok(0);
    }

    // Version is re-read under the write lock; another opener may have
    // migrated the file in between.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let from = schema_version(&tx)?;
    if from > latest {
        return Err(DbError::SchemaTooNew {
            found: from,
            supported: latest,
        });
    }

    let pending = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > from)
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return Ok(0);
    }

    for migration in &pending {
        tx.execute_batch(migration.sql)?;
        tx.pragma_update(None, "user_version", migration.version)?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, schema_version};
    use crate::db::DbError;
    use rusqlite::Connection;

    #[test]
    fn applies_once_then_is_a_no_op() {
        let mut conn = Connection::open_in_memory().expect("in-memory db");
        let applied = apply_migrations(&mut conn).expect("first run");
        assert_eq!(applied, super::MIGRATIONS.len());
        assert_eq!(schema_version(&conn).expect("version"), latest_version());

        let again = apply_migrations(&mut conn).expect("second run");
        assert_eq!(again, 0);
    }

    #[test]
    fn rejects_newer_schema() {
        let mut conn = Connection::open_in_memory().expect("in-memory db");
        conn.pragma_update(None, "user_version", latest_version() + 1)
            .expect("set version");
        let err = apply_migrations(&mut conn).expect_err("newer schema must fail");
        assert!(matches!(err, DbError::SchemaTooNew { found, supported } if found == supported + 1));
    }
}
