//! Run orchestration for the amber-relay platform.
//!
//! This crate provides the execution state machine, including:
//!
//! - **Execution chain**: WorkOrder → Run → Step records with
//!   forward-only state transitions
//! - **Exit normalization**: a total mapping from the executor's open-ended
//!   exit vocabulary onto a closed enum
//! - **Orchestrator**: start paths, edge firing against a bound snapshot,
//!   retry-from-step, redacted dataclip reads, and the lost-step watchdog
//! - **Collaborator interfaces**: step dispatch, expression evaluation,
//!   dataclip storage

pub mod config;
pub mod dataclip;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod run;
pub mod step;
pub mod store;
pub mod work_order;

pub use config::OrchestratorConfig;
pub use dataclip::{Dataclip, DataclipError, DataclipStore, DataclipType, InMemoryDataclipStore};
pub use error::OrchestratorError;
pub use executor::{
    DispatchError, EvalError, ExpressionEvaluator, StepDispatch, StepDispatcher, StepResult,
};
pub use orchestrator::{DataclipView, Orchestrator, RunHandle};
pub use run::{Run, RunState, StartingNode};
pub use step::{ExitReason, Step, normalize_exit_reason};
pub use store::{InMemoryRunStore, RunStore, RunStoreError};
pub use work_order::{WorkOrder, WorkOrderState};
