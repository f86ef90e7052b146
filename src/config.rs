use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::loader::FailurePolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub inputs: InputsConfig,
    pub load: LoadConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputsConfig {
    pub garch_forecast: PathBuf,
    pub garch_21d_smoothed: PathBuf,
    pub realised_volatility: PathBuf,
    #[serde(default = "default_realised_date_column")]
    pub realised_date_column: String,
    #[serde(default = "default_realised_value_column")]
    pub realised_value_column: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadConfig {
    pub on_row_error: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

fn default_realised_date_column() -> String {
    "Date".to_string()
}

fn default_realised_value_column() -> String {
    "realised_vol_21d".to_string()
}

impl LoadConfig {
    pub fn failure_policy(&self) -> Result<FailurePolicy> {
        match FailurePolicy::parse(&self.on_row_error) {
            Some(policy) => Ok(policy),
            None => bail!(
                "invalid load.on_row_error '{}': expected 'abort' or 'continue'",
                self.on_row_error
            ),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = Path::new("config/default.toml");
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        let mut config: Config =
            toml::from_str(&config_str).context("failed to parse config/default.toml")?;

        if let Ok(path) = std::env::var("VOL_STORE_PATH") {
            if !path.trim().is_empty() {
                config.store.path = PathBuf::from(path);
            }
        }

        config
            .load
            .failure_policy()
            .context("load.on_row_error is invalid")?;

        Ok(config)
    }
}
