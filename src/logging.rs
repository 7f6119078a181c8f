//! Tracing subscriber setup for the CLI.
//!
//! Filter priority, highest first: `FRAME_COMPARE_LOG`, `RUST_LOG`, then the
//! level implied by `--verbose` / `--quiet`. Logs go to stderr so stdout stays
//! reserved for the machine-readable run status.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

pub const LOG_ENV: &str = "FRAME_COMPARE_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    /// Verbose wins when both flags are given.
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    pub const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Installs the global subscriber. Call once, early in `main`.
pub fn init_subscriber(verbosity: Verbosity, no_color: bool) {
    let filter = build_env_filter(verbosity);
    let use_ansi = !no_color && std::io::IsTerminal::is_terminal(&std::io::stderr());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi)
        .with_target(verbosity == Verbosity::Verbose);

    if verbosity == Verbosity::Verbose {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.with_timer(fmt::time::uptime()))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.without_time().compact())
            .init();
    }
}

fn build_env_filter(verbosity: Verbosity) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV) {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(default_directive(verbosity))
}

fn default_directive(verbosity: Verbosity) -> String {
    let level = verbosity.default_level().as_str().to_ascii_lowercase();
    match verbosity {
        // Keep dependency chatter out of debug output.
        Verbosity::Verbose => format!("warn,frame_compare_report={level}"),
        Verbosity::Normal | Verbosity::Quiet => level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_flag_wins() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn default_directives_scope_debug_to_this_crate() {
        assert_eq!(default_directive(Verbosity::Normal), "info");
        assert_eq!(default_directive(Verbosity::Quiet), "error");
        assert_eq!(
            default_directive(Verbosity::Verbose),
            "warn,frame_compare_report=debug"
        );
    }
}
