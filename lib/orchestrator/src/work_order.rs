//! Work orders: one external invocation of a workflow.
//!
//! A work order owns one or more runs; more than one only via retry. Its
//! state rolls up the most recent run, so a retry moves a settled order
//! back to running until the new run finishes.

use crate::run::RunState;
use amber_relay_core::{DataclipId, TriggerId, WorkOrderId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The state of a work order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderState {
    /// Created, no run dispatched yet.
    Pending,
    /// The latest run is in flight.
    Running,
    /// The latest run succeeded.
    Success,
    /// The latest run failed or crashed.
    Failed,
}

/// One external invocation of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    /// Unique identifier.
    pub id: WorkOrderId,
    /// The workflow invoked.
    pub workflow_id: WorkflowId,
    /// The trigger that fired, or `None` for a manual job start.
    pub trigger_id: Option<TriggerId>,
    /// The initial input.
    pub dataclip_id: DataclipId,
    /// Current state.
    pub state: WorkOrderState,
    /// When this work order was created.
    pub inserted_at: DateTime<Utc>,
    /// When this work order last changed state.
    pub updated_at: DateTime<Utc>,
}

impl WorkOrder {
    /// Creates a new pending work order.
    #[must_use]
    pub fn new(
        workflow_id: WorkflowId,
        trigger_id: Option<TriggerId>,
        dataclip_id: DataclipId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: WorkOrderId::new(),
            workflow_id,
            trigger_id,
            dataclip_id,
            state: WorkOrderState::Pending,
            inserted_at: now,
            updated_at: now,
        }
    }

    /// Marks the order as running. Used at dispatch and again on retry.
    pub fn mark_running(&mut self) {
        self.state = WorkOrderState::Running;
        self.updated_at = Utc::now();
    }

    /// Settles the order from the terminal state of its latest run.
    pub fn settle(&mut self, run_state: RunState) {
        self.state = match run_state {
            RunState::Success => WorkOrderState::Success,
            RunState::Failed | RunState::Crashed => WorkOrderState::Failed,
            RunState::Pending | RunState::Running => return,
        };
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_order_settles_from_run_state() {
        let mut order = WorkOrder::new(WorkflowId::new(), None, DataclipId::new());
        assert_eq!(order.state, WorkOrderState::Pending);

        order.mark_running();
        assert_eq!(order.state, WorkOrderState::Running);

        order.settle(RunState::Crashed);
        assert_eq!(order.state, WorkOrderState::Failed);

        // A retry re-opens the order
        order.mark_running();
        assert_eq!(order.state, WorkOrderState::Running);

        order.settle(RunState::Success);
        assert_eq!(order.state, WorkOrderState::Success);
    }

    #[test]
    fn non_terminal_run_state_does_not_settle() {
        let mut order = WorkOrder::new(WorkflowId::new(), None, DataclipId::new());
        order.mark_running();
        order.settle(RunState::Running);
        assert_eq!(order.state, WorkOrderState::Running);
    }

    #[test]
    fn work_order_serde_roundtrip() {
        let order = WorkOrder::new(WorkflowId::new(), Some(TriggerId::new()), DataclipId::new());
        let json = serde_json::to_string(&order).expect("serialize");
        let parsed: WorkOrder = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(order, parsed);
    }
}
