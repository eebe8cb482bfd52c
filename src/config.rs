//! Configuration of the `srv-proxy` binary.

use crate::CacheTtl;
use std::{net::SocketAddr, time::Duration};

/// Environment variable holding the address the proxy listens on.
pub const LISTEN_ENV_VAR: &str = "SRV_PROXY_LISTEN";
/// Environment variable holding the SRV lookup timeout in milliseconds.
pub const LOOKUP_TIMEOUT_ENV_VAR: &str = "SRV_PROXY_LOOKUP_TIMEOUT_MS";
/// Environment variable holding the cache TTL in seconds. Unset or `record`
/// honours the TTL of DNS answers; [`CACHE_FOREVER`] caches until invalidated.
pub const CACHE_TTL_ENV_VAR: &str = "SRV_PROXY_CACHE_TTL_SECS";
/// Value of [`CACHE_TTL_ENV_VAR`] that keeps cached endpoints until invalidated.
pub const CACHE_FOREVER: &str = "forever";
/// Value of [`CACHE_TTL_ENV_VAR`] that honours the TTL of DNS answers.
pub const CACHE_RECORD: &str = "record";

/// Errors produced while reading a [`ProxyConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable holds a value of the wrong shape
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// The offending variable
        key: &'static str,
        /// Its value
        value: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Runtime settings of the proxy binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Address the HTTP server binds to.
    pub listen: SocketAddr,
    /// Bound on a single SRV lookup.
    pub lookup_timeout: Duration,
    /// How long resolved endpoints are cached.
    pub cache_ttl: CacheTtl,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 9080)),
            lookup_timeout: Duration::from_millis(1000),
            cache_ttl: CacheTtl::Record,
        }
    }
}

impl ProxyConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(LISTEN_ENV_VAR) {
            config.listen = parse(LISTEN_ENV_VAR, value)?;
        }
        if let Some(value) = lookup(LOOKUP_TIMEOUT_ENV_VAR) {
            config.lookup_timeout = Duration::from_millis(parse(LOOKUP_TIMEOUT_ENV_VAR, value)?);
        }
        if let Some(value) = lookup(CACHE_TTL_ENV_VAR) {
            config.cache_ttl = match value.trim() {
                CACHE_RECORD => CacheTtl::Record,
                CACHE_FOREVER => CacheTtl::UntilInvalidated,
                _ => CacheTtl::Fixed(Duration::from_secs(parse(CACHE_TTL_ENV_VAR, value)?)),
            };
        }

        Ok(config)
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}
