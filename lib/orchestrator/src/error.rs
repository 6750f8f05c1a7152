//! Error types for the orchestrator crate.
//!
//! The taxonomy mirrors how callers must react:
//! - validation errors are rejected before any state mutation
//! - conflict errors ask the caller to retry with fresh state
//! - not-found errors are terminal for the request
//! - precondition errors block an otherwise structurally valid operation
//!
//! Execution failures reported by the executor are data on the step, not
//! errors here.

use crate::dataclip::DataclipError;
use crate::executor::{DispatchError, EvalError};
use crate::store::RunStoreError;
use amber_relay_core::{
    DataclipId, JobId, RunId, SnapshotId, StepId, TriggerId, WorkOrderId, WorkflowId,
};
use amber_relay_redaction::SecretsError;
use amber_relay_workflow::{GraphError, StoreError};
use std::fmt;

/// Errors from orchestrator operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// A retry request did not name a step. Retry targets are never
    /// inferred.
    MissingStepId,
    /// Job not found in any workflow.
    JobNotFound { job_id: JobId },
    /// Trigger not found in any workflow.
    TriggerNotFound { trigger_id: TriggerId },
    /// Run not found.
    RunNotFound { run_id: RunId },
    /// Step not found.
    StepNotFound { step_id: StepId },
    /// The run has no step for the given job.
    StepNotFoundForJob { run_id: RunId, job_id: JobId },
    /// Work order not found.
    WorkOrderNotFound { work_order_id: WorkOrderId },
    /// Workflow not found.
    WorkflowNotFound { workflow_id: WorkflowId },
    /// Snapshot not found.
    SnapshotNotFound { snapshot_id: SnapshotId },
    /// Dataclip not found.
    DataclipNotFound { dataclip_id: DataclipId },
    /// The trigger has no edge leading to an existing job.
    NoConnectedJob { trigger_id: TriggerId },
    /// The dataclip's body has been wiped.
    DataclipWiped { dataclip_id: DataclipId },
    /// The workflow has been soft-deleted.
    WorkflowDeleted { workflow_id: WorkflowId },
    /// A save presented a stale lock version.
    VersionConflict {
        workflow_id: WorkflowId,
        expected: u64,
        actual: u64,
    },
    /// Any other graph-level failure (malformed edges, cycles).
    Graph(GraphError),
    /// The executor queue rejected a dispatch.
    Dispatch(DispatchError),
    /// The expression evaluator failed.
    Evaluation(EvalError),
    /// The credential backend failed.
    Secrets(SecretsError),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStepId => write!(f, "retry requires an explicit step id"),
            Self::JobNotFound { job_id } => write!(f, "job not found: {job_id}"),
            Self::TriggerNotFound { trigger_id } => {
                write!(f, "trigger not found: {trigger_id}")
            }
            Self::RunNotFound { run_id } => write!(f, "run not found: {run_id}"),
            Self::StepNotFound { step_id } => write!(f, "step not found: {step_id}"),
            Self::StepNotFoundForJob { run_id, job_id } => {
                write!(f, "run {run_id} has no step for job {job_id}")
            }
            Self::WorkOrderNotFound { work_order_id } => {
                write!(f, "work order not found: {work_order_id}")
            }
            Self::WorkflowNotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::SnapshotNotFound { snapshot_id } => {
                write!(f, "snapshot not found: {snapshot_id}")
            }
            Self::DataclipNotFound { dataclip_id } => {
                write!(f, "dataclip not found: {dataclip_id}")
            }
            Self::NoConnectedJob { trigger_id } => {
                write!(f, "trigger {trigger_id} has no edge to an existing job")
            }
            Self::DataclipWiped { dataclip_id } => {
                write!(f, "dataclip has been wiped: {dataclip_id}")
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
            Self::Graph(e) => write!(f, "graph error: {e}"),
            Self::Dispatch(e) => write!(f, "dispatch error: {e}"),
            Self::Evaluation(e) => write!(f, "evaluation error: {e}"),
            Self::Secrets(e) => write!(f, "secrets error: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<StoreError> for OrchestratorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::WorkflowNotFound { workflow_id } => Self::WorkflowNotFound { workflow_id },
            StoreError::SnapshotNotFound { snapshot_id } => Self::SnapshotNotFound { snapshot_id },
            StoreError::JobNotFound { job_id } => Self::JobNotFound { job_id },
            StoreError::TriggerNotFound { trigger_id } => Self::TriggerNotFound { trigger_id },
            StoreError::WorkflowDeleted { workflow_id } => Self::WorkflowDeleted { workflow_id },
            StoreError::VersionConflict {
                workflow_id,
                expected,
                actual,
            } => Self::VersionConflict {
                workflow_id,
                expected,
                actual,
            },
        }
    }
}

impl From<RunStoreError> for OrchestratorError {
    fn from(e: RunStoreError) -> Self {
        match e {
            RunStoreError::WorkOrderNotFound { work_order_id } => {
                Self::WorkOrderNotFound { work_order_id }
            }
            RunStoreError::RunNotFound { run_id } => Self::RunNotFound { run_id },
            RunStoreError::StepNotFound { step_id } => Self::StepNotFound { step_id },
            RunStoreError::StepNotFoundForJob { run_id, job_id } => {
                Self::StepNotFoundForJob { run_id, job_id }
            }
        }
    }
}

impl From<DataclipError> for OrchestratorError {
    fn from(e: DataclipError) -> Self {
        match e {
            DataclipError::NotFound { dataclip_id } => Self::DataclipNotFound { dataclip_id },
        }
    }
}

impl From<GraphError> for OrchestratorError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::JobNotFound { job_id } => Self::JobNotFound { job_id },
            GraphError::TriggerNotFound { trigger_id } => Self::TriggerNotFound { trigger_id },
            GraphError::NoConnectedJob { trigger_id } => Self::NoConnectedJob { trigger_id },
            other => Self::Graph(other),
        }
    }
}

impl From<DispatchError> for OrchestratorError {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

impl From<EvalError> for OrchestratorError {
    fn from(e: EvalError) -> Self {
        Self::Evaluation(e)
    }
}

impl From<SecretsError> for OrchestratorError {
    fn from(e: SecretsError) -> Self {
        Self::Secrets(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_step_id_display() {
        let err = OrchestratorError::MissingStepId;
        assert!(err.to_string().contains("explicit step id"));
    }

    #[test]
    fn store_error_conversion_preserves_conflict_detail() {
        let workflow_id = WorkflowId::new();
        let err: OrchestratorError = StoreError::VersionConflict {
            workflow_id,
            expected: 2,
            actual: 4,
        }
        .into();
        match err {
            OrchestratorError::VersionConflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
