use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app_settings::Config;

pub const ENV_TREE: &str = "SOULDESK_TREE";

const LOCAL_CONFIG: &str = "config/config.yaml";

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level: tracing::Level = if debug {
        tracing::Level::DEBUG
    } else {
        level
            .parse()
            .with_context(|| format!("Invalid log level '{level}'"))?
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    // stdout carries command output; logs go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
}

/// `./config/config.yaml` if present, else the per-user config directory
fn default_config_path() -> Result<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Ok(local);
    }
    let dir = dirs::config_dir().context("Failed to get config directory")?;
    Ok(dir.join("souldesk").join("config.yaml"))
}

pub async fn load_config(explicit: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };

    if !path.exists() {
        warn!("No config at {}, using built-in defaults", path.display());
        return Ok(LoadedConfig {
            config: Config::default(),
            path,
        });
    }

    let config = read_config(&path).await?;
    info!("Loaded configuration from: {}", path.display());
    Ok(LoadedConfig { config, path })
}

async fn read_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Environment wins over the config file
pub fn apply_env_overrides(config: &mut Config) {
    config.timings = config.timings.with_env_overrides();

    match env::var(ENV_TREE) {
        Ok(tree) if !tree.trim().is_empty() => {
            info!("Using element tree from {}: {}", ENV_TREE, tree.trim());
            config.tree = Some(PathBuf::from(tree.trim()));
        }
        _ => debug!("{} not set", ENV_TREE),
    }
}
