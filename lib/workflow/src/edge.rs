//! Edge types for workflow graphs.
//!
//! An edge connects a source node (a trigger or a job) to a target job and
//! carries the condition deciding whether it fires once the source has
//! produced a result.

use crate::error::GraphError;
use amber_relay_core::{EdgeId, JobId, TriggerId};
use serde::{Deserialize, Serialize};

/// Condition deciding whether an edge fires after its source completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgeCondition {
    /// Fires unconditionally.
    Always,
    /// Fires when the source step exited with success.
    OnSuccess,
    /// Fires when the source step exited with fail.
    OnFailure,
    /// Fires when the expression evaluates truthy against the step result.
    /// Evaluation is delegated to an external expression service.
    JsExpression {
        /// The expression source.
        expression: String,
    },
}

/// The source endpoint of an edge: exactly one of a trigger or a job.
///
/// Stored records allow both source columns to be populated, which is
/// semantically invalid. That ambiguity is resolved once, in
/// [`EdgeRecord::normalize`], so traversal code never sees a dual source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EdgeSource {
    /// The edge leaves a trigger.
    Trigger(TriggerId),
    /// The edge leaves a job.
    Job(JobId),
}

impl EdgeSource {
    /// Returns true if the edge leaves a trigger.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        matches!(self, Self::Trigger(_))
    }

    /// Returns true if the edge leaves a job.
    #[must_use]
    pub fn is_job(&self) -> bool {
        matches!(self, Self::Job(_))
    }

    /// Returns the source trigger id, if the edge leaves a trigger.
    #[must_use]
    pub fn trigger_id(&self) -> Option<TriggerId> {
        match self {
            Self::Trigger(id) => Some(*id),
            Self::Job(_) => None,
        }
    }

    /// Returns the source job id, if the edge leaves a job.
    #[must_use]
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::Trigger(_) => None,
            Self::Job(id) => Some(*id),
        }
    }
}

/// An edge connecting a source node to a target job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique identifier for this edge.
    pub id: EdgeId,
    /// The source endpoint.
    pub source: EdgeSource,
    /// The target job. `None` marks a structurally incomplete edge: it is
    /// never traversed, but it is not a ghost edge either and survives
    /// ghost-edge removal.
    pub target_job_id: Option<JobId>,
    /// The firing condition.
    pub condition: EdgeCondition,
    /// Whether this edge participates in traversal.
    pub enabled: bool,
}

impl Edge {
    /// Creates an enabled edge from a trigger to a job.
    ///
    /// Trigger edges fire unconditionally: a trigger has no exit reason to
    /// condition on.
    #[must_use]
    pub fn from_trigger(trigger_id: TriggerId, target_job_id: JobId) -> Self {
        Self {
            id: EdgeId::new(),
            source: EdgeSource::Trigger(trigger_id),
            target_job_id: Some(target_job_id),
            condition: EdgeCondition::Always,
            enabled: true,
        }
    }

    /// Creates an enabled edge from a job to a job with the given condition.
    #[must_use]
    pub fn from_job(source_job_id: JobId, target_job_id: JobId, condition: EdgeCondition) -> Self {
        Self {
            id: EdgeId::new(),
            source: EdgeSource::Job(source_job_id),
            target_job_id: Some(target_job_id),
            condition,
            enabled: true,
        }
    }

    /// Disables this edge.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Returns a disabled copy of this edge.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A raw edge record as supplied by imports and external editors.
///
/// Unlike [`Edge`], both source columns may be populated here. Callers must
/// not assume mutual exclusivity; [`EdgeRecord::normalize`] resolves the
/// ambiguity at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Edge id; a fresh one is minted when absent.
    #[serde(default)]
    pub id: Option<EdgeId>,
    /// Source trigger column.
    #[serde(default)]
    pub source_trigger_id: Option<TriggerId>,
    /// Source job column.
    #[serde(default)]
    pub source_job_id: Option<JobId>,
    /// Target job column.
    #[serde(default)]
    pub target_job_id: Option<JobId>,
    /// The firing condition.
    pub condition: EdgeCondition,
    /// Whether this edge participates in traversal.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl EdgeRecord {
    /// Normalizes this record into an [`Edge`] with exactly one source.
    ///
    /// When both source columns are set, the trigger takes precedence and the
    /// job column is discarded. A record with neither source is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EdgeWithoutSource`] when neither source column
    /// is populated.
    pub fn normalize(self) -> Result<Edge, GraphError> {
        let id = self.id.unwrap_or_default();
        let source = match (self.source_trigger_id, self.source_job_id) {
            (Some(trigger_id), _) => EdgeSource::Trigger(trigger_id),
            (None, Some(job_id)) => EdgeSource::Job(job_id),
            (None, None) => return Err(GraphError::EdgeWithoutSource { edge_id: id }),
        };

        Ok(Edge {
            id,
            source,
            target_job_id: self.target_job_id,
            condition: self.condition,
            enabled: self.enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_edge_is_always() {
        let edge = Edge::from_trigger(TriggerId::new(), JobId::new());
        assert_eq!(edge.condition, EdgeCondition::Always);
        assert!(edge.source.is_trigger());
        assert!(!edge.source.is_job());
        assert!(edge.enabled);
    }

    #[test]
    fn job_edge_source_accessors() {
        let source = JobId::new();
        let target = JobId::new();
        let edge = Edge::from_job(source, target, EdgeCondition::OnSuccess);

        assert_eq!(edge.source.job_id(), Some(source));
        assert_eq!(edge.source.trigger_id(), None);
        assert_eq!(edge.target_job_id, Some(target));
    }

    #[test]
    fn record_with_trigger_source_normalizes() {
        let trigger_id = TriggerId::new();
        let target = JobId::new();
        let record = EdgeRecord {
            id: None,
            source_trigger_id: Some(trigger_id),
            source_job_id: None,
            target_job_id: Some(target),
            condition: EdgeCondition::Always,
            enabled: true,
        };

        let edge = record.normalize().expect("should normalize");
        assert_eq!(edge.source, EdgeSource::Trigger(trigger_id));
    }

    #[test]
    fn dual_source_record_prefers_trigger() {
        let trigger_id = TriggerId::new();
        let job_id = JobId::new();
        let record = EdgeRecord {
            id: None,
            source_trigger_id: Some(trigger_id),
            source_job_id: Some(job_id),
            target_job_id: Some(JobId::new()),
            condition: EdgeCondition::Always,
            enabled: true,
        };

        let edge = record.normalize().expect("should normalize");
        assert_eq!(edge.source, EdgeSource::Trigger(trigger_id));
        assert_eq!(edge.source.job_id(), None);
    }

    #[test]
    fn sourceless_record_is_rejected() {
        let edge_id = EdgeId::new();
        let record = EdgeRecord {
            id: Some(edge_id),
            source_trigger_id: None,
            source_job_id: None,
            target_job_id: Some(JobId::new()),
            condition: EdgeCondition::Always,
            enabled: true,
        };

        let err = record.normalize().expect_err("should reject");
        assert_eq!(err, GraphError::EdgeWithoutSource { edge_id });
    }

    #[test]
    fn record_without_target_survives_normalization() {
        let record = EdgeRecord {
            id: None,
            source_trigger_id: None,
            source_job_id: Some(JobId::new()),
            target_job_id: None,
            condition: EdgeCondition::OnFailure,
            enabled: true,
        };

        let edge = record.normalize().expect("should normalize");
        assert_eq!(edge.target_job_id, None);
    }

    #[test]
    fn edge_serde_roundtrip() {
        let edge = Edge::from_job(
            JobId::new(),
            JobId::new(),
            EdgeCondition::JsExpression {
                expression: "state.data.age > 18".to_string(),
            },
        );
        let json = serde_json::to_string(&edge).expect("serialize");
        let parsed: Edge = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(edge, parsed);
    }
}
