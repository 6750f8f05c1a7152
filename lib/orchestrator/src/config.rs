//! Orchestrator configuration.
//!
//! Loaded via the `config` crate from environment variables, e.g.
//! `STEP_TIMEOUT_SECONDS=300`.

use chrono::Duration;
use serde::Deserialize;

/// Runtime configuration for the orchestrator.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// How long a dispatched step may stay unreported before the watchdog
    /// reaps it as `lost`. `None` disables the watchdog and steps may stay
    /// pending indefinitely.
    #[serde(default)]
    pub step_timeout_seconds: Option<u64>,

    /// Interval between watchdog sweeps, in seconds.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_sweep_interval_seconds() -> u64 {
    60
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            step_timeout_seconds: None,
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

impl OrchestratorConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if present configuration is malformed.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the step timeout as a duration, if configured.
    #[must_use]
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_seconds
            .map(|seconds| Duration::seconds(seconds as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchdog_is_off_by_default() {
        let config = OrchestratorConfig::default();
        assert!(config.step_timeout().is_none());
        assert_eq!(config.sweep_interval_seconds, 60);
    }

    #[test]
    fn step_timeout_converts_to_duration() {
        let config = OrchestratorConfig {
            step_timeout_seconds: Some(300),
            ..Default::default()
        };
        assert_eq!(config.step_timeout(), Some(Duration::seconds(300)));
    }
}
