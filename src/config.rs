use anyhow::{Context, Result};
use std::{env, fmt::Display, path::PathBuf, str::FromStr};
use tracing::info;

use crate::expiry::ExpiryConfig;
use crate::time_weights::HeatConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub expiry: ExpiryConfig,
    pub heat: HeatConfig,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::load(|key| env::var(key).ok())
    }

    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            database_url: try_load(&lookup, "DATABASE_URL", "sqlite://spots.db?mode=rwc")?,
            expiry: ExpiryConfig {
                default_timeout_minutes: try_load(&lookup, "DEFAULT_TIMEOUT_MINUTES", "15")?,
            },
            heat: HeatConfig {
                window_days: try_load(&lookup, "HEAT_WINDOW_DAYS", "20")?,
            },
            static_dir: try_load(&lookup, "STATIC_DIR", "static")?,
        })
    }
}

fn try_load<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw}"))
}
