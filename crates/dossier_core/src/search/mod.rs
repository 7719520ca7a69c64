//! Record lookup filters.
//!
//! # Responsibility
//! - Normalize user-entered search text.
//! - Decide whether one record matches a filter.

pub mod filter;
