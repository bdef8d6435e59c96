//! Configuration loading and typed config structures for the demo engine.
//!
//! The canonical configuration lives in `microcollab-config.yaml` at the
//! project root. Every field has a default, so an empty file (or no file)
//! yields a working demo.

use std::path::Path;

use serde::Deserialize;

/// Environment variable that overrides [`MarketConfig::seed`].
pub const SEED_ENV_VAR: &str = "MICROCOLLAB_SEED";

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

    /// The configuration parsed but its values are unusable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level demo engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Seeding parameters.
    #[serde(default)]
    pub market: MarketConfig,

    /// Tick timing.
    #[serde(default)]
    pub ticks: TickConfig,

    /// Activity feed retention.
    #[serde(default)]
    pub event_log: EventLogConfig,

    /// Relative likelihood of each synthesized event type.
    #[serde(default)]
    pub weights: EventWeights,

    /// Settings for the demo binary.
    #[serde(default)]
    pub demo: DemoConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `MICROCOLLAB_SEED` overrides `market.seed` when set to a valid `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.market.apply_env_overrides();
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticks.min_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "ticks.min_interval_ms must be at least 1".to_owned(),
            });
        }
        if self.ticks.min_interval_ms > self.ticks.max_interval_ms {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "ticks.min_interval_ms ({}) exceeds ticks.max_interval_ms ({})",
                    self.ticks.min_interval_ms, self.ticks.max_interval_ms
                ),
            });
        }
        if self.event_log.capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "event_log.capacity must be at least 1".to_owned(),
            });
        }
        if self.weights.request_posted == 0 {
            return Err(ConfigError::Invalid {
                reason: "weights.request_posted must be non-zero; it is the fallback event"
                    .to_owned(),
            });
        }
        Ok(())
    }
}

/// Seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MarketConfig {
    /// Random seed for reproducible runs.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of open requests created by `load_initial_data`.
    #[serde(default = "default_initial_requests")]
    pub initial_requests: usize,
}

impl MarketConfig {
    /// Apply the `MICROCOLLAB_SEED` override, ignoring unparsable values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(seed) = std::env::var(SEED_ENV_VAR)
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
        {
            self.seed = seed;
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            initial_requests: default_initial_requests(),
        }
    }
}

/// Tick timing. Each tick waits a uniformly random delay in
/// `[min_interval_ms, max_interval_ms]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TickConfig {
    /// Shortest delay between ticks.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Longest delay between ticks.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
        }
    }
}

/// Activity feed retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EventLogConfig {
    /// Maximum number of events kept; the oldest are evicted first.
    #[serde(default = "default_event_log_capacity")]
    pub capacity: usize,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_log_capacity(),
        }
    }
}

/// Relative weights for choosing the next synthesized event type.
///
/// Posting and offering dominate so the feed looks busy; terminal events
/// are rarer. A zero weight disables that event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EventWeights {
    /// Weight of `request_posted`.
    #[serde(default = "default_weight_request_posted")]
    pub request_posted: u32,
    /// Weight of `offer_sent`.
    #[serde(default = "default_weight_offer_sent")]
    pub offer_sent: u32,
    /// Weight of `offer_accepted`.
    #[serde(default = "default_weight_offer_accepted")]
    pub offer_accepted: u32,
    /// Weight of `session_started`.
    #[serde(default = "default_weight_session_started")]
    pub session_started: u32,
    /// Weight of `session_completed`.
    #[serde(default = "default_weight_session_completed")]
    pub session_completed: u32,
}

impl Default for EventWeights {
    fn default() -> Self {
        Self {
            request_posted: default_weight_request_posted(),
            offer_sent: default_weight_offer_sent(),
            offer_accepted: default_weight_offer_accepted(),
            session_started: default_weight_session_started(),
            session_completed: default_weight_session_completed(),
        }
    }
}

/// Settings for the `microcollab-demo` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DemoConfig {
    /// How long the demo runs before stopping, in seconds.
    #[serde(default = "default_run_seconds")]
    pub run_seconds: u64,

    /// How many recent events to print at the end.
    #[serde(default = "default_feed_size")]
    pub feed_size: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            run_seconds: default_run_seconds(),
            feed_size: default_feed_size(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const fn default_seed() -> u64 {
    42
}

const fn default_initial_requests() -> usize {
    12
}

const fn default_min_interval_ms() -> u64 {
    3_000
}

const fn default_max_interval_ms() -> u64 {
    8_000
}

const fn default_event_log_capacity() -> usize {
    50
}

const fn default_weight_request_posted() -> u32 {
    35
}

const fn default_weight_offer_sent() -> u32 {
    35
}

const fn default_weight_offer_accepted() -> u32 {
    12
}

const fn default_weight_session_started() -> u32 {
    10
}

const fn default_weight_session_completed() -> u32 {
    8
}

const fn default_run_seconds() -> u64 {
    30
}

const fn default_feed_size() -> usize {
    10
}

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = SimulationConfig::parse("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.market.initial_requests, 12);
        assert_eq!(config.event_log.capacity, 50);
    }

    #[test]
    fn partial_yaml_overrides_only_given_fields() {
        let yaml = r"
market:
  seed: 7
ticks:
  max_interval_ms: 9000
weights:
  session_completed: 0
";
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.market.seed, 7);
        assert_eq!(config.market.initial_requests, 12);
        assert_eq!(config.ticks.min_interval_ms, 3_000);
        assert_eq!(config.ticks.max_interval_ms, 9_000);
        assert_eq!(config.weights.session_completed, 0);
        assert_eq!(config.weights.offer_sent, 35);
    }

    #[test]
    fn inverted_interval_band_is_rejected() {
        let yaml = r"
ticks:
  min_interval_ms: 5000
  max_interval_ms: 1000
";
        let result = SimulationConfig::parse(yaml);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = SimulationConfig::parse("event_log:\n  capacity: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_fallback_weight_is_rejected() {
        let result = SimulationConfig::parse("weights:\n  request_posted: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let result = SimulationConfig::parse("ticks: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let yaml = include_str!("../../../microcollab-config.yaml");
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config, SimulationConfig::default());
    }
}
