//! Configuration file loading.
//!
//! The configuration is a TOML file read once at startup. Unknown keys,
//! missing required keys and out-of-range values are all fatal.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mailauth_core::service::{ImapValidator, Security};
use mailauth_core::{AuthConfig, RelayIdentity};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Longest accepted cache TTL (one year).
const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// bcrypt's accepted cost range.
const HASH_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The path does not name a regular file.
    #[error("{0} is not a regular file")]
    NotAFile(PathBuf),

    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path of the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the expected shape.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or empty.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How the validator connects to the IMAP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImapSecurity {
    /// TLS from the first byte.
    #[default]
    Implicit,
    /// Plaintext greeting, then STARTTLS.
    Starttls,
}

impl From<ImapSecurity> for Security {
    fn from(value: ImapSecurity) -> Self {
        match value {
            ImapSecurity::Implicit => Self::Implicit,
            ImapSecurity::Starttls => Self::StartTls,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Usernames allowed to authenticate.
    pub users: Vec<String>,
    /// Mailbox server host.
    pub imap_host: String,
    /// Submission relay host.
    pub smtp_host: String,
    /// Relay username presented for every SMTP session.
    pub smtp_user: String,
    /// Relay password presented for every SMTP session.
    #[serde(deserialize_with = "secret")]
    pub smtp_pass: SecretString,
    /// Address the HTTP server binds to.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Seconds a confirmed credential stays cached.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Seconds allowed for one credential check against the IMAP server.
    #[serde(default = "default_validator_timeout_secs")]
    pub validator_timeout_secs: u64,
    /// bcrypt cost for cached hashes.
    #[serde(default = "default_hash_cost")]
    pub hash_cost: u32,
    /// IMAP server port.
    #[serde(default = "default_imap_port")]
    pub imap_port: u16,
    /// IMAP connection security.
    #[serde(default)]
    pub imap_security: ImapSecurity,
}

fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

const fn default_cache_ttl_secs() -> u64 {
    15 * 60
}

const fn default_validator_timeout_secs() -> u64 {
    30
}

const fn default_hash_cost() -> u32 {
    10
}

const fn default_imap_port() -> u16 {
    993
}

impl Config {
    /// Reads, parses and validates the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the path is not a regular file, cannot be
    /// read, does not parse, or holds invalid values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(ConfigError::NotAFile(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    /// Checks values that parse but make no sense.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.users.is_empty() {
            return Err(ConfigError::Invalid("users must not be empty".to_string()));
        }
        if self.users.iter().any(String::is_empty) {
            return Err(ConfigError::Invalid(
                "users must not contain an empty name".to_string(),
            ));
        }
        for (key, value) in [("imap_host", &self.imap_host), ("smtp_host", &self.smtp_host)] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be empty")));
            }
        }
        if self.cache_ttl_secs == 0 || self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "cache_ttl_secs must be between 1 and {MAX_CACHE_TTL_SECS}"
            )));
        }
        if self.validator_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "validator_timeout_secs must be positive".to_string(),
            ));
        }
        if !HASH_COST_RANGE.contains(&self.hash_cost) {
            return Err(ConfigError::Invalid(format!(
                "hash_cost must be between {} and {}",
                HASH_COST_RANGE.start(),
                HASH_COST_RANGE.end()
            )));
        }
        if self.imap_port == 0 {
            return Err(ConfigError::Invalid("imap_port must not be 0".to_string()));
        }
        Ok(())
    }

    /// Engine settings derived from this configuration.
    #[must_use]
    pub fn auth_config(&self) -> AuthConfig {
        let relay = RelayIdentity::new(
            self.smtp_user.clone(),
            SecretString::from(self.smtp_pass.expose_secret().to_owned()),
        );
        AuthConfig::new(
            self.users.iter().cloned(),
            self.imap_host.clone(),
            self.smtp_host.clone(),
            relay,
        )
        .cache_ttl(Duration::from_secs(self.cache_ttl_secs))
        .hash_cost(self.hash_cost)
        .validator_timeout(self.validator_timeout())
    }

    /// IMAP validator derived from this configuration.
    #[must_use]
    pub fn validator(&self) -> ImapValidator {
        let total = self.validator_timeout();
        ImapValidator::new(self.imap_security.into())
            .with_port(self.imap_port)
            .with_timeouts(total.min(Duration::from_secs(10)), total)
    }

    const fn validator_timeout(&self) -> Duration {
        Duration::from_secs(self.validator_timeout_secs)
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
