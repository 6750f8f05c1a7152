//! Collaborator interfaces for step execution.
//!
//! The orchestrator never blocks on job execution. It hands a
//! [`StepDispatch`] to a [`StepDispatcher`] and resumes when the executor
//! reports a [`StepResult`] back through
//! [`Orchestrator::handle_step_result`]. Cancellation and executor-side
//! timeouts are the executor's concern; the orchestrator only reacts to
//! reported completions.
//!
//! [`Orchestrator::handle_step_result`]: crate::orchestrator::Orchestrator::handle_step_result

use amber_relay_core::{DataclipId, RunId, StepId};
use amber_relay_workflow::Job;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// A step handed off to the external executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDispatch {
    /// The run this step belongs to.
    pub run_id: RunId,
    /// The step to execute.
    pub step_id: StepId,
    /// The job to run, as captured in the run's snapshot.
    pub job: Job,
    /// The input payload.
    pub input_dataclip_id: DataclipId,
}

/// Completion report from the external executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// The run the step belongs to.
    pub run_id: RunId,
    /// The step that finished.
    pub step_id: StepId,
    /// Raw exit reason. Open-ended vocabulary; `None` means still running.
    pub exit_reason: Option<String>,
    /// Executor-supplied error classification.
    pub error_type: Option<String>,
    /// The output payload, if the job produced one.
    pub output: Option<JsonValue>,
}

/// Errors from dispatching a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The executor queue could not be reached.
    QueueUnavailable { message: String },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueUnavailable { message } => {
                write!(f, "executor queue unavailable: {message}")
            }
        }
    }
}

impl std::error::Error for DispatchError {}

/// Trait for the asynchronous hand-off to the external executor.
#[async_trait]
pub trait StepDispatcher: Send + Sync {
    /// Enqueues a step for execution. Must not wait for the step to run.
    async fn dispatch(&self, dispatch: StepDispatch) -> Result<(), DispatchError>;
}

/// Errors from expression evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The expression could not be evaluated.
    EvaluationFailed { message: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EvaluationFailed { message } => {
                write!(f, "expression evaluation failed: {message}")
            }
        }
    }
}

impl std::error::Error for EvalError {}

/// Trait for evaluating `js_expression` edge conditions.
///
/// Evaluation happens in an external sandbox; the orchestrator only needs
/// the boolean verdict against the completed step's output.
#[async_trait]
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluates an expression against a step result payload.
    async fn evaluate(&self, expression: &str, result: &JsonValue) -> Result<bool, EvalError>;
}
