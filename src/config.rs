use crate::error::ConfigError;
use serde::Deserialize;
use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

/// Default verifier address, used by both the verifier and the holder
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
/// Default holder key file
pub const DEFAULT_KEYFILE: &str = "keyfile.jwk";
/// Default nonce lifetime, in seconds
pub const DEFAULT_NONCE_TTL: i64 = 60;
/// Default ceiling on outstanding nonces
pub const DEFAULT_NONCE_CAPACITY: usize = 100_000;
/// Default period of the background sweep, in seconds
pub const DEFAULT_SWEEP_INTERVAL: u64 = 30;
/// Default largest raw token accepted by `/verify`, in bytes
pub const DEFAULT_MAX_TOKEN_SIZE: usize = 10 * 1024;

const MIN_TOKEN_SIZE: usize = 64;

/// Configuration for the verifier service
///
/// Every field has a default, and every default can be overridden through the environment:
///
/// | Field            | Variable             | Default          |
/// |------------------|----------------------|------------------|
/// | `listen_addr`    | `YJT_ADDR`           | `127.0.0.1:8080` |
/// | `nonce_ttl`      | `YJT_NONCE_TTL`      | `60`             |
/// | `nonce_capacity` | `YJT_NONCE_CAPACITY` | `100000`         |
/// | `sweep_interval` | `YJT_SWEEP_INTERVAL` | `30`             |
/// | `max_token_size` | `YJT_MAX_TOKEN_SIZE` | `10240`          |
///
/// # Example
/// ```rust
/// use eddsa_jwt::VerifierConfig;
///
/// let config = VerifierConfig {
///     nonce_ttl: 300, // 5 minutes
///     ..VerifierConfig::default()
/// };
/// config.validate().unwrap();
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Socket address the HTTP server binds to
    pub listen_addr: SocketAddr,
    /// Nonce Time To Live (TTL) in seconds
    ///
    /// A nonce presented after this window fails with `Expired`, even if it was never used.
    /// Suggested values are between 60 and 300 seconds.
    pub nonce_ttl: i64,
    /// Maximum number of nonces held at once before issuance is refused
    pub nonce_capacity: usize,
    /// Seconds between background sweeps of consumed and expired nonces
    pub sweep_interval: u64,
    /// Largest raw token, in bytes, that is decoded at all
    pub max_token_size: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            nonce_ttl: DEFAULT_NONCE_TTL,
            nonce_capacity: DEFAULT_NONCE_CAPACITY,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_token_size: DEFAULT_MAX_TOKEN_SIZE,
        }
    }
}

impl VerifierConfig {
    /// Build a configuration from the `YJT_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build a configuration from variables resolved by `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            listen_addr: parse_or("YJT_ADDR", lookup("YJT_ADDR"), defaults.listen_addr)?,
            nonce_ttl: parse_or("YJT_NONCE_TTL", lookup("YJT_NONCE_TTL"), defaults.nonce_ttl)?,
            nonce_capacity: parse_or(
                "YJT_NONCE_CAPACITY",
                lookup("YJT_NONCE_CAPACITY"),
                defaults.nonce_capacity,
            )?,
            sweep_interval: parse_or(
                "YJT_SWEEP_INTERVAL",
                lookup("YJT_SWEEP_INTERVAL"),
                defaults.sweep_interval,
            )?,
            max_token_size: parse_or(
                "YJT_MAX_TOKEN_SIZE",
                lookup("YJT_MAX_TOKEN_SIZE"),
                defaults.max_token_size,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the verifier relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nonce_ttl <= 0 {
            return Err(invalid("YJT_NONCE_TTL", "must be a positive number of seconds"));
        }
        if self.nonce_capacity == 0 {
            return Err(invalid("YJT_NONCE_CAPACITY", "must be at least 1"));
        }
        if self.sweep_interval == 0 {
            return Err(invalid("YJT_SWEEP_INTERVAL", "must be a positive number of seconds"));
        }
        if self.max_token_size < MIN_TOKEN_SIZE {
            return Err(invalid(
                "YJT_MAX_TOKEN_SIZE",
                format!("must be at least {MIN_TOKEN_SIZE} bytes"),
            ));
        }
        Ok(())
    }

    /// The nonce lifetime as a duration
    pub fn nonce_validity(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.nonce_ttl)
    }
}

/// Configuration for the holder program
///
/// | Field           | Variable       | Default              |
/// |-----------------|----------------|----------------------|
/// | `verifier_addr` | `YJT_ADDR`     | `127.0.0.1:8080`     |
/// | `key_file`      | `YJT_KEYFILE`  | `keyfile.jwk`        |
/// | `subject`       | `YJT_SUBJECT`  | `holder`             |
/// | `audience`      | `YJT_AUDIENCE` | `eddsa-jwt-verifier` |
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HolderConfig {
    /// `host:port` of the verifier
    pub verifier_addr: String,
    /// Path of the JWK key file, created on first use
    pub key_file: PathBuf,
    /// Subject placed in the `sub` claim
    pub subject: String,
    /// Audience placed in the `aud` claim
    pub audience: String,
}

impl Default for HolderConfig {
    fn default() -> Self {
        Self {
            verifier_addr: DEFAULT_ADDR.to_string(),
            key_file: PathBuf::from(DEFAULT_KEYFILE),
            subject: "holder".to_string(),
            audience: "eddsa-jwt-verifier".to_string(),
        }
    }
}

impl HolderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build a configuration from variables resolved by `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            verifier_addr: lookup("YJT_ADDR").unwrap_or(defaults.verifier_addr),
            key_file: lookup("YJT_KEYFILE").map(PathBuf::from).unwrap_or(defaults.key_file),
            subject: lookup("YJT_SUBJECT").unwrap_or(defaults.subject),
            audience: lookup("YJT_AUDIENCE").unwrap_or(defaults.audience),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let port = self
            .verifier_addr
            .rsplit_once(':')
            .filter(|(host, _)| !host.is_empty())
            .map(|(_, port)| port)
            .ok_or_else(|| invalid("YJT_ADDR", "expected host:port"))?;
        port.parse::<u16>()
            .map_err(|e| invalid("YJT_ADDR", format!("invalid port '{port}': {e}")))?;
        if self.key_file.as_os_str().is_empty() {
            return Err(invalid("YJT_KEYFILE", "must not be empty"));
        }
        Ok(())
    }

    /// Base URL of the verifier
    pub fn verifier_url(&self) -> String {
        format!("http://{}", self.verifier_addr)
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| invalid(var, e.to_string())),
        None => Ok(default),
    }
}

fn invalid(var: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { var, reason: reason.into() }
}
