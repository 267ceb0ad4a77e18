//! Configuration for the tincture chat server.
//!
//! Loaded once from a TOML file at startup. A missing file is created with
//! the defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tincture_chat::ChatSettings;
use tincture_scheduler::Threading;
use tracing::info;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub host: HostSettings,
    pub chat: ChatSettings,
    pub logging: LoggingSettings,
    /// Players put online at startup.
    pub players: Vec<PlayerSeed>,
}

/// Threading model of the in-process host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostSettings {
    /// Run one tick thread per region instead of a single global thread.
    pub threaded_regions: bool,
    /// Number of region threads when `threaded_regions` is set.
    pub regions: usize,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            threaded_regions: false,
            regions: 4,
        }
    }
}

impl HostSettings {
    /// Maps the settings onto the scheduler's threading model.
    pub fn threading(&self) -> Threading {
        if self.threaded_regions {
            Threading::Regionized {
                regions: self.regions,
            }
        } else {
            Threading::Single
        }
    }
}

/// Logging output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Emit structured JSON lines.
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// A player created at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlayerSeed {
    /// Login name, unique ignoring case.
    pub name: String,
    /// Markup display name; the login name when absent.
    pub display_name: Option<String>,
    pub world: Option<String>,
    /// Region the player's entity is spawned in.
    pub region: usize,
    /// Stored in the meta store and served by the `meta` provider.
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Permission nodes granted to the player.
    pub permissions: Vec<String>,
}

impl AppConfig {
    /// Loads configuration from a TOML file, writing the defaults there first
    /// if it does not exist.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the TOML file.
    ///
    /// # Returns
    ///
    /// The parsed configuration, or an error naming the file that could not
    /// be read, parsed or written.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Checks the configuration for consistency.
    ///
    /// # Returns
    ///
    /// `Ok(())` or a message describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.threaded_regions && self.host.regions == 0 {
            return Err("host.regions must be at least 1 when threaded_regions is set".to_string());
        }

        self.chat
            .validate()
            .map_err(|e| format!("Invalid chat settings: {}", e))?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        let mut names = HashSet::new();
        for seed in &self.players {
            if seed.name.trim().is_empty() {
                return Err("Player names cannot be empty".to_string());
            }
            if !names.insert(seed.name.to_lowercase()) {
                return Err(format!("Player '{}' is configured twice", seed.name));
            }
        }

        Ok(())
    }
}
