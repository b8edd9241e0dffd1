use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::scroll::ScrollMetrics;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub scroll: ScrollMetrics,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST backend
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// Bearer token from the last login
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Per-request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            access_token: None,
            refresh_token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_hostname() -> String {
    "https://api-dev.unicornhunters.com".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

/// Dashboard loading behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// A source taking longer than this counts as failed for the phase
    #[serde(default = "default_source_timeout")]
    pub source_timeout_secs: u64,
    /// Side effects buffered before producers start waiting
    #[serde(default = "default_side_effect_capacity")]
    pub side_effect_capacity: usize,
    /// How many cached products the offline source serves
    #[serde(default = "default_future_products_limit")]
    pub future_products_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: default_source_timeout(),
            side_effect_capacity: default_side_effect_capacity(),
            future_products_limit: default_future_products_limit(),
        }
    }
}

fn default_source_timeout() -> u64 {
    20
}

fn default_side_effect_capacity() -> usize {
    16
}

fn default_future_products_limit() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Interval between position samples while playing
    #[serde(default = "default_position_poll")]
    pub position_poll_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            position_poll_ms: default_position_poll(),
        }
    }
}

fn default_position_poll() -> u64 {
    100
}

/// Values the host keeps across screen recreation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub scroll_factor: f32,
    #[serde(default)]
    pub last_position: i64,
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "unicorns", "Unicorns")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        let config_dir = dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file, falling back to defaults
    /// when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            tracing::info!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}
