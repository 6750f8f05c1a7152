//! Trigger types for workflow initiation.
//!
//! Triggers are entry points into a workflow graph. The engine does not own
//! the transports behind them: webhook delivery and cron firing are external
//! collaborators that call into the orchestrator with a trigger id.

use amber_relay_core::TriggerId;
use serde::{Deserialize, Serialize};

/// The type of trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// HTTP webhook trigger.
    Webhook,
    /// Time-based trigger with a cron expression.
    Cron,
    /// Manual trigger (user-initiated).
    Manual,
}

/// Configuration for a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerConfig {
    /// HTTP webhook trigger. The request payload becomes the initial dataclip.
    Webhook,
    /// Cron-style scheduled trigger.
    Cron {
        /// Cron expression (e.g. "0 7 * * *" for 7am daily).
        expression: String,
        /// Timezone for the schedule.
        timezone: Option<String>,
    },
    /// Manual trigger (user-initiated).
    Manual,
}

/// An entry-point node in a workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Unique identifier for this trigger.
    pub id: TriggerId,
    /// Whether this trigger is currently enabled.
    pub enabled: bool,
    /// Trigger configuration.
    pub config: TriggerConfig,
}

impl Trigger {
    /// Creates a new enabled trigger.
    #[must_use]
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            id: TriggerId::new(),
            enabled: true,
            config,
        }
    }

    /// Creates a webhook trigger.
    #[must_use]
    pub fn webhook() -> Self {
        Self::new(TriggerConfig::Webhook)
    }

    /// Creates a cron trigger with the given expression.
    #[must_use]
    pub fn cron(expression: impl Into<String>) -> Self {
        Self::new(TriggerConfig::Cron {
            expression: expression.into(),
            timezone: None,
        })
    }

    /// Returns the trigger type.
    #[must_use]
    pub fn trigger_type(&self) -> TriggerType {
        match &self.config {
            TriggerConfig::Webhook => TriggerType::Webhook,
            TriggerConfig::Cron { .. } => TriggerType::Cron,
            TriggerConfig::Manual => TriggerType::Manual,
        }
    }

    /// Enables this trigger.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Disables this trigger.
    pub fn disable(&mut self) {
        self.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_trigger_creation() {
        let trigger = Trigger::webhook();
        assert_eq!(trigger.trigger_type(), TriggerType::Webhook);
        assert!(trigger.enabled);
    }

    #[test]
    fn cron_trigger_creation() {
        let trigger = Trigger::cron("0 7 * * *");
        assert_eq!(trigger.trigger_type(), TriggerType::Cron);
        match &trigger.config {
            TriggerConfig::Cron { expression, timezone } => {
                assert_eq!(expression, "0 7 * * *");
                assert!(timezone.is_none());
            }
            _ => panic!("expected cron config"),
        }
    }

    #[test]
    fn trigger_enable_disable() {
        let mut trigger = Trigger::new(TriggerConfig::Manual);
        assert!(trigger.enabled);

        trigger.disable();
        assert!(!trigger.enabled);

        trigger.enable();
        assert!(trigger.enabled);
    }

    #[test]
    fn trigger_serde_roundtrip() {
        let trigger = Trigger::cron("*/5 * * * *");
        let json = serde_json::to_string(&trigger).expect("serialize");
        let parsed: Trigger = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(trigger, parsed);
    }
}
