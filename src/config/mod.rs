pub mod registry;

use anyhow::{anyhow, Context, Result};
use std::str::FromStr;

pub use registry::{CounterCache, FlagRegistry, FlaggableDeclaration, RegistryBuilder};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub flag_registry_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database_url: value_or_err(&lookup, "DATABASE_URL")?,
            db_max_connections: value_or_parse(&lookup, "DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: value_or_parse(&lookup, "DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: value_or_parse(&lookup, "DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: value_or_parse(&lookup, "DB_MAX_LIFETIME_SECONDS", "1800")?,
            flag_registry_path: lookup("FLAG_REGISTRY_PATH"),
        })
    }

    /// Load the registry file named by `FLAG_REGISTRY_PATH`, if any.
    pub fn load_registry(&self) -> Result<Option<FlagRegistry>> {
        let Some(path) = &self.flag_registry_path else {
            return Ok(None);
        };
        let document = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read FLAG_REGISTRY_PATH {}", path))?;
        let registry = FlagRegistry::from_json(&document)
            .map_err(|err| anyhow!("invalid FLAG_REGISTRY_PATH {}: {}", path, err))?;
        tracing::info!(
            path = %path,
            flaggable_types = registry.flaggable_types().count(),
            "loaded flag registry"
        );
        Ok(Some(registry))
    }
}

fn value_or_err<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| anyhow!("missing required env var: {}", key))
}

fn value_or_parse<F, T>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = lookup(key).unwrap_or_else(|| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}
