//! Telemetry helpers: tracing setup and event rendering for stdout sinks.

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const LINE_COLOR: &str = "\x1b[35m"; // magenta
pub const RESET_COLOR: &str = "\x1b[0m";

/// Install the default tracing subscriber: env-filtered fmt output plus an
/// error layer for span traces. Safe to call more than once; only the first
/// call wins.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(ErrorLayer::default())
        .try_init();
}

/// Controls whether rendered lines carry ANSI color codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FormatterMode {
    /// Detect TTY capability on stderr.
    #[default]
    Auto,
    /// Always emit color codes.
    Colored,
    /// Never emit color codes.
    Plain,
}

impl FormatterMode {
    fn colored(self) -> bool {
        match self {
            FormatterMode::Colored => true,
            FormatterMode::Plain => false,
            FormatterMode::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// Renders event descriptions into terminal lines.
pub trait TelemetryFormatter: Send + Sync {
    fn render_line(&self, description: &str) -> String;
}

/// Single-line formatter with optional coloring.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainFormatter {
    mode: FormatterMode,
}

impl PlainFormatter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_mode(mode: FormatterMode) -> Self {
        Self { mode }
    }
}

impl TelemetryFormatter for PlainFormatter {
    fn render_line(&self, description: &str) -> String {
        if self.mode.colored() {
            format!("{LINE_COLOR}{description}{RESET_COLOR}\n")
        } else {
            format!("{description}\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_has_no_ansi_codes() {
        let formatter = PlainFormatter::with_mode(FormatterMode::Plain);
        let line = formatter.render_line("step 1 [a] -> b");
        assert!(!line.contains("\x1b["));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn colored_mode_wraps_the_line() {
        let formatter = PlainFormatter::with_mode(FormatterMode::Colored);
        let line = formatter.render_line("x");
        assert!(line.starts_with(LINE_COLOR));
        assert!(line.contains(RESET_COLOR));
    }
}
