//! Diagnostic logging setup.
//!
//! Logs go to stderr without colour so they never mix into command output.

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive, e.g. `hound=debug`.
pub const LOG_ENV: &str = "HOUND_LOG";

/// Pick the filter: `HOUND_LOG` wins, then `-v`, then the configured level.
fn build_filter(level: &str, verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { level };

    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber. Calling it again is a no-op.
pub fn init(level: &str, verbose: bool) {
    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(build_filter(level, verbose))
        .try_init();
    if let Err(e) = installed {
        tracing::debug!(error = %e, "log subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_uses_debug() {
        if std::env::var(LOG_ENV).is_err() {
            assert_eq!(build_filter("warn", true).to_string(), "debug");
        }
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init("warn", false);
        init("info", true);
    }
}
