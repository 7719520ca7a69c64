//! Domain model for stored records and their note history.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own the single-line serialized form of note entries.
//!
//! # Invariants
//! - Every record is addressed by a non-empty `identifier`.
//! - Note logs are append-only; prior entries are never edited or removed.

pub mod record;
