//! Error types for the workflow crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `GraphError`: traversal and validity failures over a graph
//! - `StoreError`: persistence failures (lookups, version conflicts)

use amber_relay_core::{EdgeId, JobId, SnapshotId, TriggerId, WorkflowId};
use std::fmt;

/// Errors from graph traversal and validation.
///
/// These errors contain only information available at the graph layer.
/// Workflow-level context (like workflow_id) should be added by the caller
/// using `.context()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Job with the given ID was not found in the graph.
    JobNotFound { job_id: JobId },
    /// Trigger with the given ID was not found in the graph.
    TriggerNotFound { trigger_id: TriggerId },
    /// A trigger has no enabled edge leading to an existing job.
    NoConnectedJob { trigger_id: TriggerId },
    /// An edge record carries neither a trigger nor a job source.
    EdgeWithoutSource { edge_id: EdgeId },
    /// Two nodes in the graph share an ID.
    DuplicateNodeId { id: String },
    /// An edge targets a job that does not exist in the graph.
    GhostEdge { edge_id: EdgeId, target_job_id: JobId },
    /// Graph contains cycles.
    CycleDetected,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JobNotFound { job_id } => {
                write!(f, "job not found: {job_id}")
            }
            Self::TriggerNotFound { trigger_id } => {
                write!(f, "trigger not found: {trigger_id}")
            }
            Self::NoConnectedJob { trigger_id } => {
                write!(f, "trigger {trigger_id} has no edge to an existing job")
            }
            Self::EdgeWithoutSource { edge_id } => {
                write!(f, "edge {edge_id} has neither a trigger nor a job source")
            }
            Self::DuplicateNodeId { id } => {
                write!(f, "duplicate node id: {id}")
            }
            Self::GhostEdge {
                edge_id,
                target_job_id,
            } => {
                write!(f, "edge {edge_id} targets missing job {target_job_id}")
            }
            Self::CycleDetected => write!(f, "graph contains cycles"),
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors from workflow persistence operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Workflow not found.
    WorkflowNotFound { workflow_id: WorkflowId },
    /// Snapshot not found.
    SnapshotNotFound { snapshot_id: SnapshotId },
    /// No workflow contains the given job.
    JobNotFound { job_id: JobId },
    /// No workflow contains the given trigger.
    TriggerNotFound { trigger_id: TriggerId },
    /// The workflow has been soft-deleted.
    WorkflowDeleted { workflow_id: WorkflowId },
    /// The stored lock version no longer matches the one the caller read.
    VersionConflict {
        workflow_id: WorkflowId,
        expected: u64,
        actual: u64,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::SnapshotNotFound { snapshot_id } => {
                write!(f, "snapshot not found: {snapshot_id}")
            }
            Self::JobNotFound { job_id } => {
                write!(f, "no workflow contains job {job_id}")
            }
            Self::TriggerNotFound { trigger_id } => {
                write!(f, "no workflow contains trigger {trigger_id}")
            }
            Self::WorkflowDeleted { workflow_id } => {
                write!(f, "workflow deleted: {workflow_id}")
            }
            Self::VersionConflict {
                workflow_id,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "version conflict on workflow {workflow_id}: expected {expected}, stored {actual}"
                )
            }
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_display() {
        let job_id = JobId::new();
        let err = GraphError::JobNotFound { job_id };
        assert!(err.to_string().contains("job not found"));
    }

    #[test]
    fn no_connected_job_display() {
        let trigger_id = TriggerId::new();
        let err = GraphError::NoConnectedJob { trigger_id };
        assert!(err.to_string().contains("no edge to an existing job"));
    }

    #[test]
    fn version_conflict_display() {
        let err = StoreError::VersionConflict {
            workflow_id: WorkflowId::new(),
            expected: 3,
            actual: 5,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("expected 3"));
        assert!(rendered.contains("stored 5"));
    }
}
