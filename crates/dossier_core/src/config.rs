//! Runtime configuration.
//!
//! # Responsibility
//! - Resolve database path, signing secret, token policy and logging level.
//! - Keep environment variable names and defaults in one place.
//!
//! # Invariants
//! - The signing secret is never empty and never logged.
//! - Token max age is configuration, not a codec constant.

use crate::logging::default_log_level;
use crate::token::{MaxAge, DEFAULT_TOKEN_MAX_AGE_SECS};
use log::warn;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable names.
pub mod env_vars {
    pub const DB_PATH: &str = "DOSSIER_DB_PATH";
    pub const SECRET_KEY: &str = "SECRET_KEY";
    /// Seconds, or `unbounded` to disable the age check entirely.
    pub const TOKEN_MAX_AGE_SECS: &str = "TOKEN_MAX_AGE_SECS";
    pub const PUBLIC_URL: &str = "DOSSIER_PUBLIC_URL";
    pub const LOG_LEVEL: &str = "DOSSIER_LOG_LEVEL";
    pub const LOG_DIR: &str = "DOSSIER_LOG_DIR";
}

/// Default values.
pub mod defaults {
    pub const DB_PATH: &str = "./dossier.sqlite3";
    /// Development-only fallback; a warning is logged whenever it is used.
    pub const SECRET_KEY: &str = "change-this-secret-in-production";
    pub const PUBLIC_URL: &str = "http://localhost:5000/";
    pub const ACCESS_PATH: &str = "autologin";
}

const UNBOUNDED_MAX_AGE: &str = "unbounded";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptySecret,
    InvalidMaxAge(String),
    InvalidPublicUrl(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySecret => write!(f, "`{}` must not be empty", env_vars::SECRET_KEY),
            Self::InvalidMaxAge(value) => write!(
                f,
                "`{}` must be a number of seconds or `{UNBOUNDED_MAX_AGE}`, got `{value}`",
                env_vars::TOKEN_MAX_AGE_SECS
            ),
            Self::InvalidPublicUrl(value) => write!(
                f,
                "`{}` must be an absolute URL, got `{value}`",
                env_vars::PUBLIC_URL
            ),
        }
    }
}

impl Error for ConfigError {}

/// Resolved core configuration.
#[derive(Clone)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub secret_key: String,
    pub token_max_age: MaxAge,
    /// Base URL access links are built against.
    pub public_url: url::Url,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Debug for CoreConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("db_path", &self.db_path)
            .field("secret_key", &"<redacted>")
            .field("token_max_age", &self.token_max_age)
            .field("public_url", &self.public_url.as_str())
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl CoreConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let secret_key = match lookup(env_vars::SECRET_KEY) {
            Some(value) if value.is_empty() => return Err(ConfigError::EmptySecret),
            Some(value) => value,
            None => {
                warn!(
                    "event=config_load module=config status=degraded reason=default_secret_key"
                );
                defaults::SECRET_KEY.to_string()
            }
        };

        let token_max_age = match read(env_vars::TOKEN_MAX_AGE_SECS) {
            Some(value) => parse_max_age(&value)?,
            None => MaxAge::from_secs(DEFAULT_TOKEN_MAX_AGE_SECS),
        };

        let public_url_text =
            read(env_vars::PUBLIC_URL).unwrap_or_else(|| defaults::PUBLIC_URL.to_string());
        let public_url = url::Url::parse(&public_url_text)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or(ConfigError::InvalidPublicUrl(public_url_text))?;

        Ok(Self {
            db_path: read(env_vars::DB_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(defaults::DB_PATH)),
            secret_key,
            token_max_age,
            public_url,
            log_level: read(env_vars::LOG_LEVEL)
                .unwrap_or_else(|| default_log_level().to_string()),
            log_dir: read(env_vars::LOG_DIR).map(PathBuf::from),
        })
    }
}

/// Parses a max-age setting: whole seconds, or `unbounded`.
pub fn parse_max_age(value: &str) -> Result<MaxAge, ConfigError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case(UNBOUNDED_MAX_AGE) {
        return Ok(MaxAge::Unbounded);
    }

    trimmed
        .parse::<u64>()
        .map(|secs| MaxAge::Within(Duration::from_secs(secs)))
        .map_err(|_| ConfigError::InvalidMaxAge(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{env_vars, parse_max_age, ConfigError, CoreConfig};
    use crate::token::MaxAge;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn defaults_keep_long_token_lifetime() {
        let config = CoreConfig::from_lookup(lookup(&[])).expect("defaults should load");
        assert_eq!(config.token_max_age, MaxAge::from_secs(999_999_999));
        assert_eq!(config.db_path, PathBuf::from("./dossier.sqlite3"));
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = CoreConfig::from_lookup(lookup(&[
            (env_vars::SECRET_KEY, "s3cret"),
            (env_vars::TOKEN_MAX_AGE_SECS, "unbounded"),
            (env_vars::DB_PATH, "/var/lib/dossier/records.sqlite3"),
            (env_vars::PUBLIC_URL, "https://records.example.edu/app/"),
        ]))
        .expect("overrides should load");
        assert_eq!(config.secret_key, "s3cret");
        assert_eq!(config.token_max_age, MaxAge::Unbounded);
        assert_eq!(config.public_url.as_str(), "https://records.example.edu/app/");
    }

    #[test]
    fn rejects_empty_secret_and_bad_values() {
        let err = CoreConfig::from_lookup(lookup(&[(env_vars::SECRET_KEY, "")]))
            .expect_err("empty secret must fail");
        assert_eq!(err, ConfigError::EmptySecret);

        let err = parse_max_age("soon").expect_err("non-numeric must fail");
        assert!(matches!(err, ConfigError::InvalidMaxAge(_)));

        let err = CoreConfig::from_lookup(lookup(&[(env_vars::PUBLIC_URL, "not a url")]))
            .expect_err("bad url must fail");
        assert!(matches!(err, ConfigError::InvalidPublicUrl(_)));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = CoreConfig::from_lookup(lookup(&[(env_vars::SECRET_KEY, "top-secret")]))
            .expect("config");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("top-secret"));
    }
}
