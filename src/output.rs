//! Process-wide output settings.
//!
//! Documents and reports are printed to stdout so they can be piped; status
//! lines, spinners and the progress bar go to stderr and disappear in quiet
//! mode.

use std::sync::OnceLock;

static OUTPUT: OnceLock<OutputConfig> = OnceLock::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    pub quiet: bool,
    pub no_color: bool,
}

impl OutputConfig {
    /// Combines the CLI flags with `NO_COLOR` (<https://no-color.org/>).
    pub fn from_flags(quiet: bool, no_color: bool) -> Self {
        Self {
            quiet,
            no_color: no_color || std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()),
        }
    }
}

/// First call wins.
pub fn init(config: OutputConfig) {
    if OUTPUT.set(config).is_err() {
        tracing::debug!("output settings already initialized");
    }
}

pub fn config() -> OutputConfig {
    *OUTPUT.get_or_init(|| OutputConfig::from_flags(false, false))
}

pub fn is_quiet() -> bool {
    config().quiet
}

pub fn is_no_color() -> bool {
    config().no_color
}

/// `eprintln!` unless quiet.
#[macro_export]
macro_rules! status {
    ($($arg:tt)*) => {
        if !$crate::output::is_quiet() {
            eprintln!($($arg)*);
        }
    };
}
