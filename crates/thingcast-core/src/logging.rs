//! `tracing` subscriber setup shared by the Thingcast binaries.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Filter used when `RUST_LOG` is unset: the configured level, or `info`
/// when the configured level does not parse.
pub fn default_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`. With `logging.json`
/// set, events are written as JSON lines.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::filter::LevelFilter;

    use super::*;

    #[test]
    fn configured_level_is_the_default_filter() {
        let config = LoggingConfig {
            level: "thingcast_core=debug,warn".to_owned(),
            json: false,
        };
        assert_eq!(default_filter(&config).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn bad_level_falls_back_to_info() {
        let config = LoggingConfig {
            level: "thingcast=loud".to_owned(),
            json: true,
        };
        assert_eq!(default_filter(&config).max_level_hint(), Some(LevelFilter::INFO));
    }
}
