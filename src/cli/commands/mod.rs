//! Subcommand implementations.

use anyhow::Result;
use std::path::Path;

use crate::config::{ConfigFile, ConfigManager};

/// `hardware` and `models`.
pub mod hardware;

/// `languages`.
pub mod languages;

/// `sessions`, `session`, `stats` and `cleanup`.
pub mod sessions;

/// `translate`.
pub mod translate;

/// Loads the config file from `path`, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile> {
    let manager = match path {
        Some(p) => ConfigManager::with_path(p.to_path_buf()),
        None => ConfigManager::new()?,
    };
    manager.load_or_default()
}
