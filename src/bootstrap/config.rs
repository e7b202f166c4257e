//! # Configuration Loader / 配置加载器
//!
//! Reads `clipcast.toml` and maps it onto [`AppConfig`]. Loading accepts
//! whatever the file says; range checks happen in `AppConfig::validate`
//! once command-line overrides have been applied.

use anyhow::Context;
use cc_core::config::AppConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "clipcast.toml";
pub const APP_DIR_NAME: &str = "clipcast";

/// Load configuration from a TOML file
/// 从 TOML 文件加载配置
///
/// # Errors / 错误
///
/// Returns error if the file cannot be read or is not valid TOML.
pub fn load_config(config_path: PathBuf) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    let toml_value: toml::Value =
        toml::from_str(&content).context("Failed to parse config as TOML")?;
    AppConfig::from_toml(&toml_value)
}

/// `<config_dir>/clipcast/clipcast.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Resolve the effective configuration source.
///
/// An explicit path must exist. The default path is optional: when it is
/// absent the built-in defaults apply.
pub fn resolve_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    match explicit {
        Some(path) => load_config(path.to_path_buf()),
        None => match default_config_path() {
            Some(path) if path.exists() => load_config(path),
            Some(path) => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(AppConfig::default())
            }
            None => Ok(AppConfig::default()),
        },
    }
}
