//! Signed capability tokens for passwordless record access.
//!
//! # Responsibility
//! - Mint opaque, URL-safe tokens bound to one record reference.
//! - Verify integrity, origin and age of presented tokens.
//!
//! # Invariants
//! - A token either decodes to exactly the payload it was minted with, or is
//!   rejected. There is no partially trusted outcome.
//! - The codec holds no mutable state; the signing key is fixed at
//!   construction.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub mod codec;

pub use codec::{CapabilityCodec, CapabilityPayload, SigningKey};

/// Default token lifetime in seconds: effectively unbounded.
pub const DEFAULT_TOKEN_MAX_AGE_SECS: u64 = 999_999_999;

/// Maximum accepted age of a token at verification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxAge {
    /// Token age is never checked.
    Unbounded,
    /// Tokens older than this are rejected as expired.
    Within(Duration),
}

impl MaxAge {
    pub fn from_secs(secs: u64) -> Self {
        Self::Within(Duration::from_secs(secs))
    }
}

impl Default for MaxAge {
    fn default() -> Self {
        Self::from_secs(DEFAULT_TOKEN_MAX_AGE_SECS)
    }
}

impl Display for MaxAge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Within(duration) => write!(f, "{}s", duration.as_secs()),
        }
    }
}

/// Token mint/verify failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The signing secret is empty.
    EmptySecret,
    /// A token cannot be minted without a record identifier.
    EmptyIdentifier,
    /// The token cannot be split into payload, timestamp and signature.
    Malformed(&'static str),
    /// The signature does not match: tampered or signed with another key.
    InvalidSignature,
    /// The token is older than the accepted age or past its own expiry.
    Expired { age_secs: u64 },
}

impl Display for TokenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySecret => write!(f, "token signing secret must not be empty"),
            Self::EmptyIdentifier => write!(f, "token identifier must not be empty"),
            Self::Malformed(reason) => write!(f, "malformed token: {reason}"),
            Self::InvalidSignature => write!(f, "token signature does not match"),
            Self::Expired { age_secs } => write!(f, "token expired (age {age_secs}s)"),
        }
    }
}

impl Error for TokenError {}
