//! XDG-style locations for the config file and the session database.
//!
//! XDG variables win over the platform defaults so the layout is the same on
//! Linux and macOS.

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "tomes";

/// `$XDG_CONFIG_HOME/tomes`, else `~/.config/tomes`.
pub fn config_dir() -> Result<PathBuf> {
    xdg_dir("XDG_CONFIG_HOME", ".config")
}

/// `$XDG_DATA_HOME/tomes`, else `~/.local/share/tomes`.
pub fn data_dir() -> Result<PathBuf> {
    xdg_dir("XDG_DATA_HOME", ".local/share")
}

/// Default `SQLite` database location.
pub fn default_database_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("tomes.db"))
}

fn xdg_dir(var: &str, fallback: &str) -> Result<PathBuf> {
    if let Ok(base) = std::env::var(var)
        && !base.is_empty()
    {
        return Ok(PathBuf::from(base).join(APP_DIR));
    }
    let home = dirs::home_dir().context("Failed to determine home directory")?;
    Ok(home.join(fallback).join(APP_DIR))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_var<T>(var: &str, value: Option<&str>, f: impl FnOnce() -> T) -> T {
        let original = std::env::var(var).ok();
        // SAFETY: serialized by #[serial]; no other thread reads the variable.
        unsafe {
            match value {
                Some(v) => std::env::set_var(var, v),
                None => std::env::remove_var(var),
            }
        }
        let out = f();
        unsafe {
            match original {
                Some(v) => std::env::set_var(var, v),
                None => std::env::remove_var(var),
            }
        }
        out
    }

    #[test]
    #[serial]
    fn test_config_dir_default() {
        let dir = with_var("XDG_CONFIG_HOME", None, || config_dir().unwrap());
        assert!(dir.ends_with(".config/tomes"));
    }

    #[test]
    #[serial]
    fn test_config_dir_xdg_override() {
        let dir = with_var("XDG_CONFIG_HOME", Some("/custom/config"), || {
            config_dir().unwrap()
        });
        assert_eq!(dir, PathBuf::from("/custom/config/tomes"));
    }

    #[test]
    #[serial]
    fn test_database_path_under_data_dir() {
        let path = with_var("XDG_DATA_HOME", Some("/custom/data"), || {
            default_database_path().unwrap()
        });
        assert_eq!(path, PathBuf::from("/custom/data/tomes/tomes.db"));
    }

    #[test]
    #[serial]
    fn test_empty_xdg_falls_back_to_home() {
        let dir = with_var("XDG_DATA_HOME", Some(""), || data_dir().unwrap());
        assert!(dir.ends_with(".local/share/tomes"));
    }
}
