//! Subscriber setup for the `simdex` binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the executable. `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::EnvFilter;

pub use crate::config::LoggingConfig;

/// Builds the level filter for `config`, preferring `RUST_LOG` when set.
pub fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a stderr `fmt` subscriber.
///
/// Calling this more than once is harmless: later calls leave the first
/// subscriber in place and return `false`.
pub fn init(config: &LoggingConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig {
            level: "warn".to_string(),
        };
        let _ = init(&config);
        assert!(!init(&config));
    }

    #[test]
    fn test_invalid_level_falls_back() {
        let config = LoggingConfig {
            level: "=?not a level".to_string(),
        };
        // An unparsable directive must not panic
        let _ = filter(&config);
    }
}
