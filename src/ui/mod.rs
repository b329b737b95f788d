//! Terminal UI: colors, a spinner, and the translation progress bar.

mod progress;
mod spinner;
mod style;

pub use progress::ProgressReporter;
pub use spinner::Spinner;
pub use style::Style;
