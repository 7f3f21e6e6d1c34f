//! Logging setup for the `tedi` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is
//! left to the binary.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is not set.
    pub level: Level,
    /// Whether to include the module path of each event.
    pub include_target: bool,
    /// Whether to include file/line info.
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            include_target: false,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Map `-q` / `-v` counts onto a level. Debug and trace also turn on
    /// targets and locations.
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => Level::ERROR,
            (false, 0) => Level::INFO,
            (false, 1) => Level::DEBUG,
            (false, _) => Level::TRACE,
        };
        let detailed = level >= Level::DEBUG;
        Self {
            level,
            include_target: detailed,
            include_location: detailed,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("tedi_core={},tedi={}", self.level, self.level)))
    }
}

/// Install a stderr subscriber. Does nothing if one is already set.
pub fn init_logging(config: &LoggingConfig) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.include_target)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let _ = tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(LoggingConfig::from_verbosity(0, false).level, Level::INFO);
        assert_eq!(LoggingConfig::from_verbosity(1, false).level, Level::DEBUG);
        assert_eq!(LoggingConfig::from_verbosity(3, false).level, Level::TRACE);
        assert_eq!(LoggingConfig::from_verbosity(2, true).level, Level::ERROR);
    }

    #[test]
    fn detail_follows_level() {
        assert!(!LoggingConfig::from_verbosity(0, false).include_location);
        assert!(LoggingConfig::from_verbosity(1, false).include_target);
    }

    #[test]
    fn init_twice_is_harmless() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
