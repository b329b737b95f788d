use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Stderr spinner for short blocking steps such as hardware detection.
///
/// Hidden in quiet mode; cleared on drop.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn new(message: impl Into<String>) -> Self {
        let bar = if crate::output::is_quiet() {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            if let Ok(style) = ProgressStyle::default_spinner()
                .tick_strings(TICKS)
                .template("{spinner} {msg}")
            {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        };
        bar.set_message(message.into());
        Self { bar }
    }

    /// Runs `step` with the spinner shown and clears it afterwards.
    pub fn run<T>(message: impl Into<String>, step: impl FnOnce() -> T) -> T {
        let spinner = Self::new(message);
        let result = step();
        spinner.stop();
        result
    }

    pub fn stop(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_returns_step_result() {
        assert_eq!(Spinner::run("detecting", || 42), 42);
    }
}
