//! `tracing` subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LEVEL: &str = "warn";

/// Builds the filter: `RUST_LOG` first, then `configured`, then [`DEFAULT_LEVEL`].
pub fn env_filter(configured: Option<&str>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    configured
        .and_then(|level| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LEVEL))
}

/// Installs a stderr subscriber. Later calls are no-ops.
pub fn init(configured: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(configured))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_configured_level_used_without_rust_log() {
        let original = std::env::var("RUST_LOG").ok();
        // SAFETY: serialized; restored below.
        unsafe { std::env::remove_var("RUST_LOG") };

        assert_eq!(env_filter(Some("debug")).to_string(), "debug");
        assert_eq!(env_filter(None).to_string(), DEFAULT_LEVEL);

        if let Some(val) = original {
            unsafe { std::env::set_var("RUST_LOG", val) };
        }
    }
}
