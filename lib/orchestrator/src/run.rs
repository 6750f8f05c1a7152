//! Runs: one execution attempt of a workflow.
//!
//! A run binds to exactly one snapshot at creation time and never observes
//! later edits to the live workflow. Retries create a new run on the same
//! work order; runs are never mutated backwards.

use crate::step::ExitReason;
use amber_relay_core::{DataclipId, JobId, RunId, SnapshotId, TriggerId, WorkOrderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The state of a run. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Created, not yet dispatched.
    Pending,
    /// At least one step has been handed to the executor.
    Running,
    /// Every step finished and none failed or crashed.
    Success,
    /// At least one step exited `fail`.
    Failed,
    /// At least one step exited `crash` (and none exited `fail`).
    Crashed,
}

impl RunState {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Crashed)
    }
}

/// Derives the terminal state of a run from its steps' exit reasons.
///
/// Fail outranks crash: a run with both a failed and a crashed step reports
/// `Failed`.
#[must_use]
pub fn derived_state(exit_reasons: &[ExitReason]) -> RunState {
    if exit_reasons.contains(&ExitReason::Fail) {
        RunState::Failed
    } else if exit_reasons.contains(&ExitReason::Crash) {
        RunState::Crashed
    } else {
        RunState::Success
    }
}

/// Where a run started: exactly one of a trigger or a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StartingNode {
    /// Started by a trigger firing.
    Trigger(TriggerId),
    /// Started directly from a job (manual run or retry).
    Job(JobId),
}

impl StartingNode {
    /// Returns the starting trigger id, if any.
    #[must_use]
    pub fn trigger_id(&self) -> Option<TriggerId> {
        match self {
            Self::Trigger(id) => Some(*id),
            Self::Job(_) => None,
        }
    }

    /// Returns the starting job id, if any.
    #[must_use]
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::Trigger(_) => None,
            Self::Job(id) => Some(*id),
        }
    }
}

/// One execution attempt of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Unique identifier.
    pub id: RunId,
    /// The work order this run belongs to.
    pub work_order_id: WorkOrderId,
    /// The snapshot this run is bound to.
    pub snapshot_id: SnapshotId,
    /// Where the run started.
    pub starting_node: StartingNode,
    /// The input the run began from.
    pub dataclip_id: DataclipId,
    /// Current state.
    pub state: RunState,
    /// When the run was created.
    pub inserted_at: DateTime<Utc>,
    /// When the first step was dispatched.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Creates a new pending run.
    #[must_use]
    pub fn new(
        work_order_id: WorkOrderId,
        snapshot_id: SnapshotId,
        starting_node: StartingNode,
        dataclip_id: DataclipId,
    ) -> Self {
        Self {
            id: RunId::new(),
            work_order_id,
            snapshot_id,
            starting_node,
            dataclip_id,
            state: RunState::Pending,
            inserted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Marks the run as running.
    pub fn start(&mut self) {
        if self.state == RunState::Pending {
            self.state = RunState::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// Moves the run to a terminal state.
    pub fn finish(&mut self, state: RunState) {
        debug_assert!(state.is_terminal());
        if !self.state.is_terminal() {
            self.state = state;
            self.finished_at = Some(Utc::now());
        }
    }
}
