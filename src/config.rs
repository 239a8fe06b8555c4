//! Service configuration, read from `config/base.toml` overridden by an
//! environment specific file and `COUPONS_*` variables.

use std::env;

use config_crate::{Config as RawConfig, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: Server,
    pub redemption: Redemption,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub redis: String,
    pub thread_count: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Redemption {
    /// How long a single redemption may hold the per user lock, in milliseconds.
    pub lock_ttl_ms: u64,
}

impl Config {
    /// Creates config from base.toml, which is overwritten by <env>.toml, where
    /// env is one of dev, k8s, nightly. After that it could be overwritten by
    /// env variables prefixed with COUPONS.
    pub fn new() -> Result<Self, ConfigError> {
        let env = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        Config::with_env(env)
    }

    pub fn with_env(env: impl Into<String>) -> Result<Self, ConfigError> {
        let mut s = RawConfig::new();

        s.merge(File::with_name("config/base"))?;
        s.merge(File::with_name(&format!("config/{}", env.into())).required(false))?;
        s.merge(Environment::with_prefix("COUPONS"))?;
        s.try_into()
    }
}
