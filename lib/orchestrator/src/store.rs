//! Persistence interface for the execution chain and in-memory
//! implementation.
//!
//! Steps are stored once and joined to runs by id, so a replayed step can
//! belong to more than one run. `steps_for_run` orders by `started_at` with
//! insertion order breaking ties; the redaction viewpoint depends on that
//! ordering being stable.

use crate::run::Run;
use crate::step::Step;
use crate::work_order::WorkOrder;
use amber_relay_core::{JobId, RunId, StepId, WorkOrderId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;

/// Errors from execution-chain persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStoreError {
    /// Work order not found.
    WorkOrderNotFound { work_order_id: WorkOrderId },
    /// Run not found.
    RunNotFound { run_id: RunId },
    /// Step not found.
    StepNotFound { step_id: StepId },
    /// The run has no step for the given job.
    StepNotFoundForJob { run_id: RunId, job_id: JobId },
}

impl fmt::Display for RunStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkOrderNotFound { work_order_id } => {
                write!(f, "work order not found: {work_order_id}")
            }
            Self::RunNotFound { run_id } => write!(f, "run not found: {run_id}"),
            Self::StepNotFound { step_id } => write!(f, "step not found: {step_id}"),
            Self::StepNotFoundForJob { run_id, job_id } => {
                write!(f, "run {run_id} has no step for job {job_id}")
            }
        }
    }
}

impl std::error::Error for RunStoreError {}

/// Trait for execution-chain persistence.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Stores a new work order.
    async fn create_work_order(&self, order: WorkOrder) -> Result<(), RunStoreError>;

    /// Loads a work order by id.
    async fn get_work_order(&self, work_order_id: WorkOrderId) -> Result<WorkOrder, RunStoreError>;

    /// Persists an updated work order.
    async fn update_work_order(&self, order: WorkOrder) -> Result<(), RunStoreError>;

    /// Stores a new run.
    async fn create_run(&self, run: Run) -> Result<(), RunStoreError>;

    /// Loads a run by id.
    async fn get_run(&self, run_id: RunId) -> Result<Run, RunStoreError>;

    /// Persists an updated run.
    async fn update_run(&self, run: Run) -> Result<(), RunStoreError>;

    /// Stores a step and joins it to the given run.
    async fn add_step(&self, run_id: RunId, step: Step) -> Result<(), RunStoreError>;

    /// Loads a step by id.
    async fn get_step(&self, step_id: StepId) -> Result<Step, RunStoreError>;

    /// Persists an updated step.
    async fn update_step(&self, step: Step) -> Result<(), RunStoreError>;

    /// Returns a run's steps ordered by `started_at`, ties broken by
    /// insertion order.
    async fn steps_for_run(&self, run_id: RunId) -> Result<Vec<Step>, RunStoreError>;

    /// Returns the most recent step for the given job within a run.
    async fn step_for_job(&self, run_id: RunId, job_id: JobId) -> Result<Step, RunStoreError>;

    /// Returns a run that contains the given step.
    async fn run_for_step(&self, step_id: StepId) -> Result<Run, RunStoreError>;

    /// Returns (run, step) ids of unfinished steps dispatched before the
    /// cutoff. Used by the lost-step watchdog.
    async fn unfinished_steps_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<(RunId, StepId)>, RunStoreError>;
}

/// In-memory execution-chain store.
#[derive(Default)]
pub struct InMemoryRunStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    work_orders: HashMap<WorkOrderId, WorkOrder>,
    runs: HashMap<RunId, Run>,
    steps: HashMap<StepId, Step>,
    /// Step ids joined to each run, in insertion order.
    run_steps: HashMap<RunId, Vec<StepId>>,
}

impl InMemoryRunStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create_work_order(&self, order: WorkOrder) -> Result<(), RunStoreError> {
        let mut inner = self.inner.lock().await;
        inner.work_orders.insert(order.id, order);
        Ok(())
    }

    async fn get_work_order(&self, work_order_id: WorkOrderId) -> Result<WorkOrder, RunStoreError> {
        let inner = self.inner.lock().await;
        inner
            .work_orders
            .get(&work_order_id)
            .cloned()
            .ok_or(RunStoreError::WorkOrderNotFound { work_order_id })
    }

    async fn update_work_order(&self, order: WorkOrder) -> Result<(), RunStoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.work_orders.contains_key(&order.id) {
            return Err(RunStoreError::WorkOrderNotFound {
                work_order_id: order.id,
            });
        }
        inner.work_orders.insert(order.id, order);
        Ok(())
    }

    async fn create_run(&self, run: Run) -> Result<(), RunStoreError> {
        let mut inner = self.inner.lock().await;
        inner.run_steps.entry(run.id).or_default();
        inner.runs.insert(run.id, run);
        Ok(())
    }

    async fn get_run(&self, run_id: RunId) -> Result<Run, RunStoreError> {
        let inner = self.inner.lock().await;
        inner
            .runs
            .get(&run_id)
            .cloned()
            .ok_or(RunStoreError::RunNotFound { run_id })
    }

    async fn update_run(&self, run: Run) -> Result<(), RunStoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.runs.contains_key(&run.id) {
            return Err(RunStoreError::RunNotFound { run_id: run.id });
        }
        inner.runs.insert(run.id, run);
        Ok(())
    }

    async fn add_step(&self, run_id: RunId, step: Step) -> Result<(), RunStoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.runs.contains_key(&run_id) {
            return Err(RunStoreError::RunNotFound { run_id });
        }
        inner.run_steps.entry(run_id).or_default().push(step.id);
        inner.steps.insert(step.id, step);
        Ok(())
    }

    async fn get_step(&self, step_id: StepId) -> Result<Step, RunStoreError> {
        let inner = self.inner.lock().await;
        inner
            .steps
            .get(&step_id)
            .cloned()
            .ok_or(RunStoreError::StepNotFound { step_id })
    }

    async fn update_step(&self, step: Step) -> Result<(), RunStoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.steps.contains_key(&step.id) {
            return Err(RunStoreError::StepNotFound { step_id: step.id });
        }
        inner.steps.insert(step.id, step);
        Ok(())
    }

    async fn steps_for_run(&self, run_id: RunId) -> Result<Vec<Step>, RunStoreError> {
        let inner = self.inner.lock().await;
        let step_ids = inner
            .run_steps
            .get(&run_id)
            .ok_or(RunStoreError::RunNotFound { run_id })?;

        let mut steps: Vec<Step> = step_ids
            .iter()
            .filter_map(|step_id| inner.steps.get(step_id).cloned())
            .collect();
        // Stable sort keeps insertion order for equal timestamps
        steps.sort_by_key(|step| step.started_at);
        Ok(steps)
    }

    async fn step_for_job(&self, run_id: RunId, job_id: JobId) -> Result<Step, RunStoreError> {
        let steps = self.steps_for_run(run_id).await?;
        steps
            .into_iter()
            .filter(|step| step.job_id == job_id)
            .next_back()
            .ok_or(RunStoreError::StepNotFoundForJob { run_id, job_id })
    }

    async fn run_for_step(&self, step_id: StepId) -> Result<Run, RunStoreError> {
        let inner = self.inner.lock().await;
        inner
            .run_steps
            .iter()
            .find(|(_, step_ids)| step_ids.contains(&step_id))
            .and_then(|(run_id, _)| inner.runs.get(run_id))
            .cloned()
            .ok_or(RunStoreError::StepNotFound { step_id })
    }

    async fn unfinished_steps_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<(RunId, StepId)>, RunStoreError> {
        let inner = self.inner.lock().await;
        let mut lost = Vec::new();
        for (run_id, step_ids) in &inner.run_steps {
            for step_id in step_ids {
                if let Some(step) = inner.steps.get(step_id)
                    && !step.is_finished()
                    && step.started_at < cutoff
                {
                    lost.push((*run_id, *step_id));
                }
            }
        }
        Ok(lost)
    }
}
