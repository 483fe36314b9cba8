use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

/// Runtime settings. Defaults, then `swu.toml`, then `SWU_*` variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: PathBuf,
    pub api_base: String,
    pub page_size: u32,
    pub locale: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/swu_cards.sqlite"),
            api_base: "https://admin.starwarsunlimited.com/api/".to_string(),
            page_size: 40,
            locale: "en".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name("swu").required(false))
                .add_source(Environment::with_prefix("SWU").try_parsing(true)),
        )
    }

    fn from_builder(
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let settings: Settings = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        anyhow::ensure!(settings.page_size > 0, "page_size must be at least 1");
        Ok(settings)
    }
}
