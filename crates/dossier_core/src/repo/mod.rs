//! Record store over a whole-table persistence backend.
//!
//! # Responsibility
//! - Map persisted rows to `Record` values and back.
//! - Serialize every mutation as one load-mutate-save cycle.
//!
//! # Invariants
//! - Store APIs return semantic errors (`NotFound`, `Validation`) in addition
//!   to storage transport errors.
//! - A failed mutation persists nothing.

pub mod record_store;

pub use record_store::{RecordStore, StoreError, StoreResult};
