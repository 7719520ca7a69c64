//! Core domain logic for Dossier: record lookup, append-only notes and
//! signed access codes.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod table;
pub mod token;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::record::{NoteEntry, NoteLine, NoteLog, Record, RecordValidationError};
pub use repo::{RecordStore, StoreError, StoreResult};
pub use search::filter::RecordFilter;
pub use service::{access_link, AccessError, AccessResult, AccessService};
pub use table::{MemoryTable, SqliteTable, Table, TableError, TableRow, TableStore};
pub use token::{CapabilityCodec, CapabilityPayload, MaxAge, SigningKey, TokenError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
