//! Configuration management commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use crate::cli::output::{OutputFormat, print_formatted, print_success};
use crate::config::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Get a specific config value
    Get {
        /// Config key (e.g., "api.hostname", "scroll.initial_offset")
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., "api.hostname", "scroll.initial_offset")
        key: String,

        /// Value to set
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Show config file path
    Path,
}

#[derive(Serialize)]
struct ConfigPathResult {
    path: String,
    exists: bool,
}

pub async fn run(command: ConfigCommands, format: OutputFormat, quiet: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => show(format).await,
        ConfigCommands::Get { key } => get(&key, format).await,
        ConfigCommands::Set { key, value } => set(&key, &value, quiet).await,
        ConfigCommands::Path => path(format).await,
    }
}

async fn show(format: OutputFormat) -> Result<()> {
    let config = Config::load()?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
    }

    Ok(())
}

async fn get(key: &str, format: OutputFormat) -> Result<()> {
    let config = Config::load()?;

    // Parse dotted key path and extract value
    let value = get_config_value(&config, key)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(&value)?);
        }
        OutputFormat::Text => {
            println!("{}", value);
        }
    }

    Ok(())
}

fn get_config_value(config: &Config, key: &str) -> Result<String> {
    let parts: Vec<&str> = key.split('.').collect();
    let token_state = |token: &Option<String>| {
        let state = if token.is_some() { "<set>" } else { "<not set>" };
        state.to_string()
    };

    match parts.as_slice() {
        ["api", "hostname"] => Ok(config.api.hostname.clone()),
        ["api", "access_token"] => Ok(token_state(&config.api.access_token)),
        ["api", "refresh_token"] => Ok(token_state(&config.api.refresh_token)),
        ["api", "request_timeout_secs"] => Ok(config.api.request_timeout_secs.to_string()),
        ["dashboard", "source_timeout_secs"] => Ok(config.dashboard.source_timeout_secs.to_string()),
        ["dashboard", "side_effect_capacity"] => {
            Ok(config.dashboard.side_effect_capacity.to_string())
        }
        ["dashboard", "future_products_limit"] => {
            Ok(config.dashboard.future_products_limit.to_string())
        }
        ["scroll", "initial_offset"] => Ok(config.scroll.initial_offset.to_string()),
        ["scroll", "final_offset"] => Ok(config.scroll.final_offset.to_string()),
        ["scroll", "image_max_size"] => Ok(config.scroll.image_max_size.to_string()),
        ["scroll", "image_min_size"] => Ok(config.scroll.image_min_size.to_string()),
        ["scroll", "item_offset"] => Ok(config.scroll.item_offset.to_string()),
        ["scroll", "progress_max_height"] => Ok(config.scroll.progress_max_height.to_string()),
        ["scroll", "progress_min_height"] => Ok(config.scroll.progress_min_height.to_string()),
        ["player", "position_poll_ms"] => Ok(config.player.position_poll_ms.to_string()),
        ["session", "scroll_factor"] => Ok(config.session.scroll_factor.to_string()),
        ["session", "last_position"] => Ok(config.session.last_position.to_string()),
        _ => anyhow::bail!("Unknown config key: {}", key),
    }
}

async fn set(key: &str, value: &str, quiet: bool) -> Result<()> {
    let mut config = Config::load()?;

    set_config_value(&mut config, key, value)?;
    config.save()?;

    print_success(&format!("Set {} = {}", key, value), quiet);
    Ok(())
}

/// Tokens are only written by `auth login`; they are read-only here
fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["api", "hostname"] => {
            config.api.hostname = value.trim_end_matches('/').to_string();
        }
        ["api", "request_timeout_secs"] => {
            config.api.request_timeout_secs = value.parse()?;
        }
        ["dashboard", "source_timeout_secs"] => {
            config.dashboard.source_timeout_secs = value.parse()?;
        }
        ["dashboard", "side_effect_capacity"] => {
            config.dashboard.side_effect_capacity = value.parse()?;
        }
        ["dashboard", "future_products_limit"] => {
            config.dashboard.future_products_limit = value.parse()?;
        }
        ["scroll", "initial_offset"] => {
            config.scroll.initial_offset = value.parse()?;
        }
        ["scroll", "final_offset"] => {
            config.scroll.final_offset = value.parse()?;
        }
        ["scroll", "image_max_size"] => {
            config.scroll.image_max_size = value.parse()?;
        }
        ["scroll", "image_min_size"] => {
            config.scroll.image_min_size = value.parse()?;
        }
        ["scroll", "item_offset"] => {
            config.scroll.item_offset = value.parse()?;
        }
        ["scroll", "progress_max_height"] => {
            config.scroll.progress_max_height = value.parse()?;
        }
        ["scroll", "progress_min_height"] => {
            config.scroll.progress_min_height = value.parse()?;
        }
        ["player", "position_poll_ms"] => {
            config.player.position_poll_ms = value.parse()?;
        }
        ["session", "scroll_factor"] => {
            let factor: f32 = value.parse()?;
            config.session.scroll_factor = factor.clamp(0.0, 1.0);
        }
        ["session", "last_position"] => {
            config.session.last_position = value.parse()?;
        }
        _ => anyhow::bail!("Unknown or read-only config key: {}", key),
    }

    Ok(())
}

async fn path(format: OutputFormat) -> Result<()> {
    let path = Config::config_path()?;
    let exists = path.exists();

    let result = ConfigPathResult {
        path: path.to_string_lossy().to_string(),
        exists,
    };

    print_formatted(&result, format, |r| {
        format!("{}{}", r.path, if r.exists { "" } else { " (not found)" })
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let mut config = Config::default();
        set_config_value(&mut config, "scroll.initial_offset", "200").unwrap();
        set_config_value(&mut config, "api.hostname", "https://api.example.com/").unwrap();
        set_config_value(&mut config, "session.scroll_factor", "1.7").unwrap();

        assert_eq!(get_config_value(&config, "scroll.initial_offset").unwrap(), "200");
        assert_eq!(
            get_config_value(&config, "api.hostname").unwrap(),
            "https://api.example.com"
        );
        assert_eq!(get_config_value(&config, "session.scroll_factor").unwrap(), "1");
    }

    #[test]
    fn test_tokens_are_masked_and_read_only() {
        let mut config = Config::default();
        config.api.access_token = Some("secret".to_string());

        assert_eq!(get_config_value(&config, "api.access_token").unwrap(), "<set>");
        assert_eq!(get_config_value(&config, "api.refresh_token").unwrap(), "<not set>");
        assert!(set_config_value(&mut config, "api.access_token", "x").is_err());
    }

    #[test]
    fn test_bad_values_are_rejected() {
        let mut config = Config::default();
        assert!(set_config_value(&mut config, "player.position_poll_ms", "soon").is_err());
        assert!(get_config_value(&config, "player.volume").is_err());
    }
}
