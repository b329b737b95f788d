//! Configuration file management and resolution.

mod manager;

pub use manager::{
    ConfigFile, ConfigManager, LoggingConfig, ProviderConfig, RateLimitConfig, ResolveOptions,
    ResolvedConfig, TomesConfig, resolve_config,
};
