//! Job types for workflow graphs.
//!
//! A job is an executable node: a reference to an adaptor plus an opaque
//! body of code. The engine never interprets the body; it hands it to the
//! external job-execution service together with the step input.

use amber_relay_core::{CredentialId, JobId};
use serde::{Deserialize, Serialize};

/// An executable node in a workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Human-readable name.
    pub name: String,
    /// Adaptor reference (e.g. "language-http@5.0.0").
    pub adaptor: String,
    /// Opaque job code. Executed by the external runtime, never parsed here.
    pub body: String,
    /// Whether this job participates in execution.
    pub enabled: bool,
    /// Credential attached to this job, if any.
    pub credential_id: Option<CredentialId>,
}

impl Job {
    /// Creates a new enabled job with an empty body.
    #[must_use]
    pub fn new(name: impl Into<String>, adaptor: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            name: name.into(),
            adaptor: adaptor.into(),
            body: String::new(),
            enabled: true,
            credential_id: None,
        }
    }

    /// Sets the job body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Attaches a credential.
    #[must_use]
    pub fn with_credential(mut self, credential_id: CredentialId) -> Self {
        self.credential_id = Some(credential_id);
        self
    }

    /// Enables this job.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Disables this job.
    pub fn disable(&mut self) {
        self.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_creation_defaults() {
        let job = Job::new("Fetch patients", "language-http@5.0.0");
        assert_eq!(job.name, "Fetch patients");
        assert_eq!(job.adaptor, "language-http@5.0.0");
        assert!(job.enabled);
        assert!(job.body.is_empty());
        assert!(job.credential_id.is_none());
    }

    #[test]
    fn job_builder_methods() {
        let credential_id = CredentialId::new();
        let job = Job::new("Upsert", "language-dhis2@4.0.0")
            .with_body("fn(state => state)")
            .with_credential(credential_id);

        assert_eq!(job.body, "fn(state => state)");
        assert_eq!(job.credential_id, Some(credential_id));
    }

    #[test]
    fn job_enable_disable() {
        let mut job = Job::new("Toggle", "language-common@2.0.0");
        job.disable();
        assert!(!job.enabled);
        job.enable();
        assert!(job.enabled);
    }

    #[test]
    fn job_serde_roundtrip() {
        let job = Job::new("Serde", "language-common@2.0.0").with_body("fn(s => s)");
        let json = serde_json::to_string(&job).expect("serialize");
        let parsed: Job = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(job, parsed);
    }
}
