// Configuration loader
// Loads settings from an explicit path or ~/.miko/config.toml

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use super::settings::Config;

/// Load configuration from the given path, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    if !config_path.exists() {
        bail!(
            "No configuration found at {}.\n\n\
            Create it with at least one tool server, for example:\n\n\
            [mcp_servers.time]\n\
            command = \"uv\"\n\
            args = [\"run\", \"time_server.py\"]",
            config_path.display()
        );
    }

    let contents = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;

    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", config_path.display()))?;

    config
        .validate()
        .context("Configuration validation failed")?;

    tracing::info!(
        "Loaded configuration from {} ({} tool servers)",
        config_path.display(),
        config.mcp_servers.len()
    );
    Ok(config)
}

fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".miko/config.toml"))
}
