//! Access orchestration: search, annotate, mint and redeem access codes.
//!
//! # Responsibility
//! - Expose `search`, `append_note`, `request_access_token` and `redeem` to
//!   presentation layers.
//! - Turn a redeemed token into a fresh exact lookup of its one record.
//!
//! # Invariants
//! - Tokens carry only `{identifier, display_name}`; record contents are
//!   always re-read from the store.
//! - Every token rejection surfaces as the same `InvalidToken` outcome. The
//!   specific reason is logged as a metadata code only.
//! - Minting does not check that the identifier exists.

use crate::config::defaults;
use crate::model::record::{Record, RecordValidationError};
use crate::repo::record_store::{RecordStore, StoreError};
use crate::search::filter::RecordFilter;
use crate::table::TableStore;
use crate::token::{CapabilityCodec, MaxAge, TokenError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use url::Url;

pub type AccessResult<T> = Result<T, AccessError>;

/// Service error with user-presentable messages.
#[derive(Debug)]
pub enum AccessError {
    Validation(RecordValidationError),
    NotFound(String),
    /// Any token failure: malformed, forged or expired.
    InvalidToken,
    Storage(StoreError),
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(identifier) => write!(f, "no record has identifier `{identifier}`"),
            Self::InvalidToken => write!(f, "invalid token"),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for AccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::NotFound(_) | Self::InvalidToken => None,
        }
    }
}

impl From<StoreError> for AccessError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(err) => Self::Validation(err),
            StoreError::NotFound(identifier) => Self::NotFound(identifier),
            other => Self::Storage(other),
        }
    }
}

/// Facade over one record store and one token codec.
pub struct AccessService<T: TableStore> {
    store: RecordStore<T>,
    codec: CapabilityCodec,
    max_age: MaxAge,
}

impl<T: TableStore> AccessService<T> {
    pub fn new(store: RecordStore<T>, codec: CapabilityCodec, max_age: MaxAge) -> Self {
        info!("event=access_init module=service status=ok token_max_age={max_age}");
        Self {
            store,
            codec,
            max_age,
        }
    }

    pub fn store(&self) -> &RecordStore<T> {
        &self.store
    }

    /// Case-insensitive substring search; blank or absent filters match all.
    pub fn search(&self, identifier: Option<&str>, name: Option<&str>) -> AccessResult<Vec<Record>> {
        Ok(self.store.search(&RecordFilter::new(identifier, name))?)
    }

    /// Runs a search only when one was submitted.
    ///
    /// `None` means "nothing submitted", which results views render
    /// differently from `Some(vec![])` ("searched, nothing found").
    pub fn browse(&self, submitted: Option<&RecordFilter>) -> AccessResult<Option<Vec<Record>>> {
        match submitted {
            Some(filter) => Ok(Some(self.store.search(filter)?)),
            None => Ok(None),
        }
    }

    /// Appends a note to the record whose identifier matches exactly.
    pub fn append_note(&self, identifier: &str, author: &str, body: &str) -> AccessResult<Record> {
        Ok(self.store.append_note(identifier, author, body)?)
    }

    /// Adds a new record with an empty note log.
    pub fn add_record(&self, identifier: &str, display_name: &str) -> AccessResult<Record> {
        Ok(self.store.insert_record(identifier, display_name)?)
    }

    /// Mints an access token for a record reference.
    ///
    /// # Errors
    /// - `Validation(EmptyIdentifier)` when `identifier` is blank.
    pub fn request_access_token(&self, identifier: &str, display_name: &str) -> AccessResult<String> {
        let identifier = identifier.trim();
        let token = self
            .codec
            .mint(identifier, display_name.trim(), None)
            .map_err(|err| match err {
                TokenError::EmptyIdentifier => {
                    AccessError::Validation(RecordValidationError::EmptyIdentifier)
                }
                _ => AccessError::InvalidToken,
            })?;

        info!("event=token_mint module=service status=ok");
        Ok(token)
    }

    /// Verifies `token` and returns the identifier it grants access to.
    pub fn redeem(&self, token: &str) -> AccessResult<String> {
        match self.codec.verify(token, self.max_age) {
            Ok(payload) => {
                info!("event=token_redeem module=service status=ok");
                Ok(payload.identifier)
            }
            Err(err) => {
                warn!(
                    "event=token_redeem module=service status=rejected reason={}",
                    rejection_code(&err)
                );
                Err(AccessError::InvalidToken)
            }
        }
    }

    /// Redeems `token`, then looks up the one record it names.
    ///
    /// The lookup is whole-identifier, so the result holds at most one
    /// record. A valid token for a record that no longer exists yields an
    /// empty list.
    pub fn redeem_and_search(&self, token: &str) -> AccessResult<Vec<Record>> {
        let identifier = self.redeem(token)?;
        Ok(self.store.get(&identifier)?.into_iter().collect())
    }
}

/// Builds the redemption URL a scannable code should encode.
///
/// The token is placed in the `token` query parameter of the access path
/// under `base`.
pub fn access_link(base: &Url, token: &str) -> Result<Url, url::ParseError> {
    let mut link = base.join(defaults::ACCESS_PATH)?;
    link.query_pairs_mut().clear().append_pair("token", token);
    Ok(link)
}

fn rejection_code(err: &TokenError) -> &'static str {
    match err {
        TokenError::Malformed(_) => "malformed",
        TokenError::InvalidSignature => "invalid_signature",
        TokenError::Expired { .. } => "expired",
        TokenError::EmptySecret | TokenError::EmptyIdentifier => "unexpected",
    }
}

#[cfg(test)]
mod tests {
    use super::access_link;
    use url::Url;

    #[test]
    fn access_link_puts_token_in_query() {
        let base = Url::parse("https://records.example.edu/app/").expect("base url");
        let link = access_link(&base, "abc.def.ghi").expect("link");
        assert_eq!(
            link.as_str(),
            "https://records.example.edu/app/autologin?token=abc.def.ghi"
        );
    }

    #[test]
    fn access_link_replaces_existing_query() {
        let base = Url::parse("http://localhost:5000/?x=1").expect("base url");
        let link = access_link(&base, "t").expect("link");
        assert_eq!(link.query(), Some("token=t"));
    }
}
