#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_required};

/// Redis connection settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedisConfig {
    /// e.g. `redis://127.0.0.1:6379/0`
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Reads `REDIS_URL`. The service treats a missing value as "use the
/// in-memory token store", so callers usually check
/// `core_config::env_optional("REDIS_URL")` first.
#[cfg(feature = "config")]
impl FromEnv for RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(env_required("REDIS_URL")?))
    }
}
