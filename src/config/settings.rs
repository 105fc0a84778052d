/*
* Placement Engine Configuration
* ------------------------------
*
* Layers, lowest to highest priority:
* 1. Hardcoded defaults
* 2. <CONFIG_PATH>/default.{toml,json,yaml}
* 3. <CONFIG_PATH>/local.{toml,json,yaml} (environment specific)
* 4. Environment variables, prefix CPI_ and `__` between sections,
*    e.g. CPI_PICKER__MEM_HEADROOM=512
*
* Sections:
* - picker:    memory and disk headroom (MB) held back by the cluster picker
* - inventory: where the capacity snapshot lives
* - logging:   default tracing level for the binary
*/

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub picker: PickerSettings,
    pub inventory: InventorySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickerSettings {
    pub mem_headroom: u64,
    pub disk_headroom: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

impl Settings {
    /// Loads from `CONFIG_PATH`, or `./config` when unset.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_path(Path::new(&config_path))
    }

    pub fn from_path(config_path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from path: {}", config_path.display());

        let defaults = generate_default_config();
        let config = Config::builder()
            .set_default("picker.mem_headroom", defaults.picker.mem_headroom)?
            .set_default("picker.disk_headroom", defaults.picker.disk_headroom)?
            .set_default(
                "inventory.path",
                defaults.inventory.path.to_string_lossy().into_owned(),
            )?
            .set_default("logging.level", defaults.logging.level)?
            .add_source(File::with_name(&source_name(config_path, "default")).required(false))
            .add_source(File::with_name(&source_name(config_path, "local")).required(false))
            .add_source(
                Environment::with_prefix("CPI")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn log_level(&self) -> tracing::Level {
        self.logging.level.parse().unwrap_or(tracing::Level::INFO)
    }
}

fn source_name(config_path: &Path, stem: &str) -> String {
    config_path.join(stem).to_string_lossy().into_owned()
}

pub fn generate_default_config() -> Settings {
    Settings {
        picker: PickerSettings {
            mem_headroom: 0,
            disk_headroom: 0,
        },
        inventory: InventorySettings {
            path: PathBuf::from("inventory.json"),
        },
        logging: LoggingSettings {
            level: "info".to_string(),
        },
    }
}
