//! Caller-facing use-case services.
//!
//! # Responsibility
//! - Compose the record store and the token codec into request/response
//!   operations.
//! - Keep presentation layers decoupled from storage and crypto details.

pub mod access_service;

pub use access_service::{access_link, AccessError, AccessResult, AccessService};
