use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::paths;
use crate::ratelimit::{DEFAULT_IDLE_TIMEOUT, RateLimiterConfig};
use crate::storage::{StorageBackend, StorageConfig};

/// Default settings in the `[tomes]` section of config.toml.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomesConfig {
    /// Default provider name.
    pub provider: Option<String>,
    /// Default model name. Chosen from detected hardware when unset.
    pub model: Option<String>,
    /// Default target language (ISO 639-1 code).
    pub to: Option<String>,
    /// Source language; detected when unset.
    pub from: Option<String>,
    /// Abort when the book title fails to translate.
    pub strict: Option<bool>,
}

/// An OpenAI-compatible endpoint and its credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: String,
    /// API key stored directly in config (not recommended).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable name containing the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
}

impl ProviderConfig {
    /// Gets the API key, preferring the environment variable over the file.
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(env_var) = &self.api_key_env
            && let Ok(key) = std::env::var(env_var)
            && !key.is_empty()
        {
            return Some(key);
        }
        self.api_key.clone()
    }

    pub const fn requires_api_key(&self) -> bool {
        self.api_key.is_some() || self.api_key_env.is_some()
    }
}

/// The `[rate_limit]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub rps: f64,
    pub burst: u32,
    pub idle_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let defaults = RateLimiterConfig::default();
        Self {
            rps: defaults.rps,
            burst: defaults.burst,
            idle_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn to_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            rps: self.rps,
            burst: self.burst,
            idle_timeout: Duration::from_secs(self.idle_secs),
            ..RateLimiterConfig::default()
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `tomes=debug`.
    pub level: Option<String>,
}

/// The complete configuration file.
///
/// Corresponds to `~/.config/tomes/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub tomes: TomesConfig,
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// The storage section with the default database path filled in.
    pub fn storage_with_defaults(&self) -> Result<StorageConfig> {
        let mut storage = self.storage.clone();
        if storage.backend == StorageBackend::Sqlite && storage.path.is_none() {
            storage.path = Some(paths::default_database_path()?);
        }
        Ok(storage)
    }
}

/// Settings for one translation run after merging CLI and file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub provider_name: String,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub target_language: String,
    /// `None` means detect.
    pub source_language: Option<String>,
    pub strict: bool,
    pub rate_limit: RateLimiterConfig,
}

/// CLI overrides; each takes precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub to: Option<String>,
    pub from: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    /// `Some(false)` for `--no-strict`.
    pub strict: Option<bool>,
}

fn missing(key: &str, flag: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Missing required configuration: '{key}'\n\n\
         Please provide it via:\n  \
         - CLI option: tomes translate {flag}\n  \
         - Config file: ~/.config/tomes/config.toml"
    )
}

/// Merges CLI options over config file values over built-in defaults.
///
/// # Errors
///
/// Returns an error if provider, model or target language is missing, the
/// provider is not configured, or its API key is required but unset.
pub fn resolve_config(options: &ResolveOptions, config_file: &ConfigFile) -> Result<ResolvedConfig> {
    let provider_name = options
        .provider
        .as_ref()
        .or(config_file.tomes.provider.as_ref())
        .cloned()
        .ok_or_else(|| missing("provider", "--provider <name>"))?;

    let provider_config = config_file.providers.get(&provider_name).ok_or_else(|| {
        let mut available: Vec<_> = config_file.providers.keys().map(String::as_str).collect();
        available.sort_unstable();
        if available.is_empty() {
            anyhow::anyhow!(
                "Provider '{provider_name}' not found\n\n\
                 No providers configured. Add providers to ~/.config/tomes/config.toml"
            )
        } else {
            anyhow::anyhow!(
                "Provider '{provider_name}' not found\n\n\
                 Available providers:\n  \
                 - {}",
                available.join("\n  - ")
            )
        }
    })?;

    let model = options
        .model
        .as_ref()
        .or(config_file.tomes.model.as_ref())
        .cloned()
        .ok_or_else(|| missing("model", "--model <name>"))?;

    if !provider_config.models.is_empty() && !provider_config.models.contains(&model) {
        tracing::warn!(
            provider = %provider_name,
            model = %model,
            configured = %provider_config.models.join(", "),
            "model is not in the provider's configured list"
        );
    }

    let target_language = options
        .to
        .as_ref()
        .or(config_file.tomes.to.as_ref())
        .cloned()
        .ok_or_else(|| missing("to", "--to <lang>"))?;

    let source_language = options.from.clone().or_else(|| config_file.tomes.from.clone());

    let api_key = provider_config.get_api_key();
    if provider_config.requires_api_key() && api_key.is_none() {
        let env_var = provider_config.api_key_env.as_deref().unwrap_or("API_KEY");
        bail!(
            "Provider '{provider_name}' requires an API key\n\n\
             Set the {env_var} environment variable:\n  \
             export {env_var}=\"your-api-key\"\n\n\
             Or set api_key in ~/.config/tomes/config.toml"
        );
    }

    let rate_limit = config_file.rate_limit.to_limiter_config();
    if rate_limit.rps <= 0.0 || rate_limit.burst == 0 {
        bail!("Invalid [rate_limit]: rps and burst must be positive");
    }

    Ok(ResolvedConfig {
        provider_name,
        endpoint: provider_config.endpoint.clone(),
        model,
        api_key,
        target_language,
        source_language,
        strict: options.strict.or(config_file.tomes.strict).unwrap_or(true),
        rate_limit,
    })
}

/// Loads and saves the config file.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Uses `$XDG_CONFIG_HOME/tomes/config.toml` or `~/.config/tomes/config.toml`.
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_path: paths::config_dir()?.join("config.toml"),
        })
    }

    pub const fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub const fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    pub fn load(&self) -> Result<ConfigFile> {
        let contents = fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file: {}", self.config_path.display())
        })?;

        toml::from_str(&contents).with_context(|| {
            format!("Failed to parse config file: {}", self.config_path.display())
        })
    }

    pub fn save(&self, config: &ConfigFile) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
        crate::fs::atomic_write(&self.config_path, &contents).with_context(|| {
            format!("Failed to write config file: {}", self.config_path.display())
        })
    }

    /// Missing file means defaults; a file that fails to parse is an error.
    pub fn load_or_default(&self) -> Result<ConfigFile> {
        if self.config_path.exists() {
            self.load()
        } else {
            Ok(ConfigFile::default())
        }
    }
}
