//! HMAC-SHA256 token codec.
//!
//! Token layout, every segment base64url without padding:
//!
//! ```text
//! <claims json> "." <issued-at, big-endian seconds> "." <mac>
//! ```
//!
//! The MAC covers the first two segments exactly as transmitted. The MAC key
//! is derived from the configured secret and a fixed salt, so the raw secret
//! never keys a MAC directly.

use super::{MaxAge, TokenError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const KEY_DERIVATION_SALT: &[u8] = b"dossier.capability-token.v1";
const SEGMENT_SEPARATOR: char = '.';

/// Record reference carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityPayload {
    pub identifier: String,
    pub display_name: String,
}

#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "id")]
    identifier: String,
    #[serde(rename = "name")]
    display_name: String,
    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
}

/// Derived MAC key. Never printed.
#[derive(Clone)]
pub struct SigningKey {
    derived: [u8; 32],
}

impl SigningKey {
    /// Derives the MAC key from a process-wide secret.
    pub fn from_secret(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        let mut mac = new_mac(secret);
        mac.update(KEY_DERIVATION_SALT);
        let mut derived = [0u8; 32];
        derived.copy_from_slice(&mac.finalize().into_bytes());
        Ok(Self { derived })
    }
}

impl Debug for SigningKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Stateless mint/verify over one signing key.
#[derive(Debug, Clone)]
pub struct CapabilityCodec {
    key: SigningKey,
}

impl CapabilityCodec {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Shorthand for `CapabilityCodec::new(SigningKey::from_secret(secret)?)`.
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        Ok(Self::new(SigningKey::from_secret(secret.as_ref())?))
    }

    /// Mints a token for `identifier` issued now.
    ///
    /// `expiry` bounds the token lifetime independently of the verifier's
    /// max age.
    pub fn mint(
        &self,
        identifier: &str,
        display_name: &str,
        expiry: Option<Duration>,
    ) -> Result<String, TokenError> {
        self.mint_at(identifier, display_name, expiry, Utc::now())
    }

    /// Mints a token as if issued at `issued_at`.
    pub fn mint_at(
        &self,
        identifier: &str,
        display_name: &str,
        expiry: Option<Duration>,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        if identifier.trim().is_empty() {
            return Err(TokenError::EmptyIdentifier);
        }

        let issued_secs = issued_at.timestamp();
        let claims = Claims {
            identifier: identifier.to_string(),
            display_name: display_name.to_string(),
            expires_at: expiry.map(|lifetime| {
                issued_secs.saturating_add(i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX))
            }),
        };
        let claims_json = serde_json::to_vec(&claims).expect("string claims always serialize");

        let mut token = URL_SAFE_NO_PAD.encode(claims_json);
        token.push(SEGMENT_SEPARATOR);
        token.push_str(&URL_SAFE_NO_PAD.encode(encode_timestamp(issued_secs)));
        let signature = self.sign(token.as_bytes());
        token.push(SEGMENT_SEPARATOR);
        token.push_str(&URL_SAFE_NO_PAD.encode(signature));
        Ok(token)
    }

    /// Verifies `token` against the current time.
    pub fn verify(&self, token: &str, max_age: MaxAge) -> Result<CapabilityPayload, TokenError> {
        self.verify_at(token, max_age, Utc::now())
    }

    /// Verifies `token` as of `now`.
    ///
    /// # Errors
    /// - `Malformed` when the token does not have the expected structure.
    /// - `InvalidSignature` when the MAC does not match.
    /// - `Expired` when the token is older than `max_age` or past its own
    ///   expiry.
    pub fn verify_at(
        &self,
        token: &str,
        max_age: MaxAge,
        now: DateTime<Utc>,
    ) -> Result<CapabilityPayload, TokenError> {
        let token = token.trim();
        let (signed, signature_segment) = token
            .rsplit_once(SEGMENT_SEPARATOR)
            .ok_or(TokenError::Malformed("missing signature segment"))?;
        let (claims_segment, timestamp_segment) = signed
            .split_once(SEGMENT_SEPARATOR)
            .ok_or(TokenError::Malformed("missing timestamp segment"))?;
        if timestamp_segment.contains(SEGMENT_SEPARATOR) {
            return Err(TokenError::Malformed("too many segments"));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_segment)
            .map_err(|_| TokenError::Malformed("signature is not base64url"))?;
        let mut mac = new_mac(&self.key.derived);
        mac.update(signed.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let issued_secs = URL_SAFE_NO_PAD
            .decode(timestamp_segment)
            .ok()
            .and_then(|bytes| decode_timestamp(&bytes))
            .ok_or(TokenError::Malformed("timestamp is not valid"))?;
        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_segment)
            .map_err(|_| TokenError::Malformed("payload is not base64url"))?;
        let claims: Claims = serde_json::from_slice(&claims_json)
            .map_err(|_| TokenError::Malformed("payload is not valid claims"))?;

        let now_secs = now.timestamp();
        let age_secs = u64::try_from(now_secs.saturating_sub(issued_secs)).unwrap_or(0);
        if let MaxAge::Within(limit) = max_age {
            if age_secs > limit.as_secs() {
                return Err(TokenError::Expired { age_secs });
            }
        }
        if let Some(expires_at) = claims.expires_at {
            if now_secs > expires_at {
                return Err(TokenError::Expired { age_secs });
            }
        }

        Ok(CapabilityPayload {
            identifier: claims.identifier,
            display_name: claims.display_name,
        })
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        let mut mac = new_mac(&self.key.derived);
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length")
}

fn encode_timestamp(secs: i64) -> Vec<u8> {
    let bytes = u64::try_from(secs).unwrap_or(0).to_be_bytes();
    let first = bytes
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

fn decode_timestamp(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() || bytes.len() > 8 {
        return None;
    }
    let mut buf = [0u8; 8];
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    i64::try_from(u64::from_be_bytes(buf)).ok()
}

#[cfg(test)]
mod tests {
    use super::{decode_timestamp, encode_timestamp, CapabilityCodec, SigningKey};
    use crate::token::{MaxAge, TokenError};
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::time::Duration;

    fn codec() -> CapabilityCodec {
        CapabilityCodec::from_secret("unit-test-secret").expect("codec")
    }

    #[test]
    fn timestamp_encoding_strips_leading_zero_bytes() {
        assert_eq!(encode_timestamp(0), vec![0]);
        assert_eq!(encode_timestamp(0x0102), vec![1, 2]);
        assert_eq!(decode_timestamp(&[1, 2]), Some(0x0102));
        assert_eq!(decode_timestamp(&[]), None);
        assert_eq!(decode_timestamp(&[0; 9]), None);
    }

    #[test]
    fn empty_secret_is_rejected() {
        let err = SigningKey::from_secret(b"").expect_err("empty secret must fail");
        assert_eq!(err, TokenError::EmptySecret);
    }

    #[test]
    fn debug_output_hides_key_material() {
        let rendered = format!("{:?}", codec());
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn token_is_url_safe() {
        let token = codec()
            .mint("A123", "Juan Pérez / grupo+3?", None)
            .expect("mint");
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')));
        assert_eq!(token.matches('.').count(), 2);
    }

    #[test]
    fn explicit_expiry_is_enforced_even_with_unbounded_max_age() {
        let issued = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let token = codec()
            .mint_at("A123", "Ana", Some(Duration::from_secs(60)), issued)
            .expect("mint");

        codec()
            .verify_at(&token, MaxAge::Unbounded, issued + ChronoDuration::seconds(60))
            .expect("still valid at the boundary");
        let err = codec()
            .verify_at(&token, MaxAge::Unbounded, issued + ChronoDuration::seconds(61))
            .expect_err("past expiry must fail");
        assert!(matches!(err, TokenError::Expired { age_secs: 61 }));
    }

    #[test]
    fn extra_segment_is_malformed() {
        let token = codec().mint("A123", "Ana", None).expect("mint");
        let err = codec()
            .verify(&format!("x.{token}"), MaxAge::Unbounded)
            .expect_err("four segments must fail");
        assert!(matches!(err, TokenError::Malformed(_)));
    }
}
