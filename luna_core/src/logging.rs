//! Tracing setup for the `luna` binary.
//!
//! Diagnostics go to stderr so `--json` output on stdout stays clean. The
//! default filter comes from the `[logging]` config section and RUST_LOG
//! overrides it. Setting up twice is a no-op.

use crate::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when RUST_LOG is unset and the configured level does not parse
const FALLBACK_LEVEL: &str = "warn";

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL))
}

/// Install the stderr subscriber with `level` as the default filter
pub fn init_with_level(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter_for(level))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
}

pub fn init_from_config(config: &Config) {
    init_with_level(&config.logging.level)
}

#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        init_test();
        init_from_config(&Config::default());
        init_with_level("debug");
        tracing::debug!("still logging after repeated setup");
    }

    #[test]
    fn test_unparseable_level_falls_back() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert_eq!(filter_for("info").to_string(), "info");
        assert_eq!(filter_for("luna=loud").to_string(), FALLBACK_LEVEL);
    }
}
