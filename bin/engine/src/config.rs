//! Centralized engine configuration.
//!
//! This module provides strongly-typed configuration for the engine binary,
//! loaded via the `config` crate from environment variables.

use amber_relay_orchestrator::OrchestratorConfig;
use serde::Deserialize;

/// Engine configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    /// Orchestrator configuration (watchdog timeout, sweep interval).
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl EngineConfig {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_has_watchdog_off_by_default() {
        let config = EngineConfig::default();
        assert!(config.orchestrator.step_timeout_seconds.is_none());
    }
}
