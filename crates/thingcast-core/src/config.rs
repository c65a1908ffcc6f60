//! Configuration loading and typed config structures for Thingcast.
//!
//! The configuration lives in `thingcast-config.yaml` (path overridable via
//! `THINGCAST_CONFIG`). Every section and field has a default, so an empty
//! or missing file yields a working single-process setup: in-memory
//! backends, an embedded mutator, and things `a` through `g`.
//!
//! ```yaml
//! server:
//!   host: 0.0.0.0
//!   port: 8000
//! backend:
//!   kind: external            # memory | external
//!   dragonfly_url: redis://localhost:6379
//!   nats_url: nats://localhost:4222
//! mutator:
//!   embedded: false           # run `thingcast-publisher` separately
//!   thing_ids: [a, b, c]
//!   min_delay_ms: 5000
//!   max_delay_ms: 15000
//! logging:
//!   level: info
//!   json: false
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thingcast_types::{IdError, ThingId};

/// Environment variable naming an alternate config file.
pub const CONFIG_PATH_ENV: &str = "THINGCAST_CONFIG";

/// Config file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "thingcast-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid config: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Store and broadcast backend selection.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Mutator settings.
    #[serde(default)]
    pub mutator: MutatorConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Load the config file named by `THINGCAST_CONFIG`, falling back to
    /// `thingcast-config.yaml`, or defaults when that file does not exist.
    ///
    /// Environment overrides are applied and the result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        let path = Path::new(&path);
        let mut config = if path.exists() {
            Self::parse(&std::fs::read_to_string(path)?)?
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply environment variable overrides:
    ///
    /// - `DRAGONFLY_URL` overrides `backend.dragonfly_url`
    /// - `NATS_URL` overrides `backend.nats_url`
    /// - `THINGCAST_PORT` overrides `server.port` (ignored if not a port)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DRAGONFLY_URL") {
            self.backend.dragonfly_url = val;
        }
        if let Ok(val) = std::env::var("NATS_URL") {
            self.backend.nats_url = val;
        }
        if let Ok(port) = std::env::var("THINGCAST_PORT").map(|v| v.parse::<u16>()) {
            match port {
                Ok(port) => self.server.port = port,
                Err(e) => tracing::warn!(error = %e, "ignoring invalid THINGCAST_PORT"),
            }
        }
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mutator.thing_ids()?;
        if self.mutator.min_delay_ms > self.mutator.max_delay_ms {
            return Err(invalid(format!(
                "mutator.min_delay_ms ({}) exceeds mutator.max_delay_ms ({})",
                self.mutator.min_delay_ms, self.mutator.max_delay_ms
            )));
        }
        if self.backend.kind == BackendKind::Memory && !self.mutator.embedded {
            return Err(invalid(
                "the memory backend requires mutator.embedded = true".to_owned(),
            ));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid { message }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Address to bind (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which store/broadcast implementations to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process store and broadcaster. Single process only.
    #[default]
    Memory,
    /// `Dragonfly` store and NATS broadcaster, shareable across processes.
    External,
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendConfig {
    /// Backend selection.
    #[serde(default)]
    pub kind: BackendKind,

    /// `Dragonfly` connection URL.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,

    /// NATS connection URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            dragonfly_url: default_dragonfly_url(),
            nats_url: default_nats_url(),
        }
    }
}

/// Mutator settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MutatorConfig {
    /// Run the mutator on a dedicated runtime inside the server process.
    #[serde(default = "default_true")]
    pub embedded: bool,

    /// Ids of the things to track.
    #[serde(default = "default_thing_ids")]
    pub thing_ids: Vec<String>,

    /// Lower bound of the delay between two mutations of one thing.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the delay between two mutations of one thing.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Pause before restarting a loop that crashed.
    #[serde(default = "default_restart_backoff_ms")]
    pub restart_backoff_ms: u64,
}

impl MutatorConfig {
    /// Validated thing ids.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the list is empty, contains an
    /// invalid or reserved id, or contains duplicates.
    pub fn thing_ids(&self) -> Result<Vec<ThingId>, ConfigError> {
        if self.thing_ids.is_empty() {
            return Err(invalid("mutator.thing_ids must not be empty".to_owned()));
        }
        let mut seen = BTreeSet::new();
        let mut ids = Vec::with_capacity(self.thing_ids.len());
        for raw in &self.thing_ids {
            let id = ThingId::new(raw.as_str())
                .map_err(|e: IdError| invalid(format!("mutator.thing_ids: {raw:?}: {e}")))?;
            if !seen.insert(id.clone()) {
                return Err(invalid(format!("mutator.thing_ids: duplicate id {raw:?}")));
            }
            ids.push(id);
        }
        Ok(ids)
    }

    /// The inclusive range publish delays are drawn from.
    pub const fn delay_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.min_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }

    /// Pause before restarting a crashed loop.
    pub const fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            embedded: default_true(),
            thing_ids: default_thing_ids(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            restart_backoff_ms: default_restart_backoff_ms(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8000
}

fn default_dragonfly_url() -> String {
    "redis://localhost:6379".to_owned()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_owned()
}

const fn default_true() -> bool {
    true
}

fn default_thing_ids() -> Vec<String> {
    ["a", "b", "c", "d", "e", "f", "g"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

const fn default_min_delay_ms() -> u64 {
    5_000
}

const fn default_max_delay_ms() -> u64 {
    15_000
}

const fn default_restart_backoff_ms() -> u64 {
    1_000
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert!(config.mutator.embedded);
        assert_eq!(config.mutator.thing_ids.len(), 7);
        assert_eq!(
            config.mutator.delay_range(),
            (Duration::from_secs(5), Duration::from_secs(15))
        );
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(ServiceConfig::parse("").unwrap(), ServiceConfig::default());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
server:
  host: 127.0.0.1
  port: 9000
backend:
  kind: external
  dragonfly_url: redis://cache:6379
  nats_url: nats://bus:4222
mutator:
  embedded: false
  thing_ids: [x, y]
  min_delay_ms: 10
  max_delay_ms: 20
  restart_backoff_ms: 5
logging:
  level: debug
  json: true
";
        let config = ServiceConfig::parse(yaml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.backend.kind, BackendKind::External);
        assert_eq!(config.backend.nats_url, "nats://bus:4222");
        assert!(!config.mutator.embedded);
        assert_eq!(config.mutator.restart_backoff(), Duration::from_millis(5));
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ServiceConfig::parse("server:\n  port: 1234\n").unwrap();
        assert_eq!(config.server.port, 1234);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.mutator, MutatorConfig::default());
    }

    #[test]
    fn reserved_id_is_rejected() {
        let mut config = ServiceConfig::default();
        config.mutator.thing_ids = vec!["a".to_owned(), "all".to_owned()];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut config = ServiceConfig::default();
        config.mutator.thing_ids = vec!["a".to_owned(), "a".to_owned()];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn empty_id_list_is_rejected() {
        let mut config = ServiceConfig::default();
        config.mutator.thing_ids.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_delay_range_is_rejected() {
        let mut config = ServiceConfig::default();
        config.mutator.min_delay_ms = 20;
        config.mutator.max_delay_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn memory_backend_needs_embedded_mutator() {
        let mut config = ServiceConfig::default();
        config.mutator.embedded = false;
        assert!(config.validate().is_err());
        config.backend.kind = BackendKind::External;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(matches!(
            ServiceConfig::parse("server: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
