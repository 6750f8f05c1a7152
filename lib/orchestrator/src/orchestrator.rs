//! The run orchestration state machine.
//!
//! The orchestrator owns the WorkOrder → Run → Step chain:
//! 1. Resolve a start node against a fresh snapshot of the workflow
//! 2. Create the work order, run, and first step; hand the step off
//! 3. On each reported completion, normalize the exit reason, persist the
//!    step, and fire the snapshot's outgoing edges
//! 4. Finalize the run once nothing more can fire
//!
//! Execution is an asynchronous hand-off: the orchestrator never waits on a
//! step. Completions arrive as [`StepResult`] events, including from
//! concurrent runs, and each call resumes exactly one run's state machine.

use crate::config::OrchestratorConfig;
use crate::dataclip::{Dataclip, DataclipStore, DataclipType};
use crate::error::OrchestratorError;
use crate::executor::{ExpressionEvaluator, StepDispatch, StepDispatcher, StepResult};
use crate::run::{Run, StartingNode, derived_state};
use crate::step::{ExitReason, Step};
use crate::store::RunStore;
use crate::work_order::WorkOrder;
use amber_relay_core::{DataclipId, JobId, RunId, StepId, TriggerId, WorkOrderId, WorkflowId};
use amber_relay_redaction::{Scrubber, SecretsProvider};
use amber_relay_workflow::{
    EdgeCondition, SaveReceipt, Snapshot, StartTarget, Trigger, TriggerType, WorkflowDraft,
    WorkflowStore,
};
use chrono::{DateTime, Utc};
use futures::future;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identifiers returned when an execution is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunHandle {
    /// The owning work order.
    pub work_order_id: WorkOrderId,
    /// The created run.
    pub run_id: RunId,
    /// The input dataclip the run begins from.
    pub dataclip_id: DataclipId,
}

/// The answer to a conditional dataclip read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataclipView {
    /// Nothing changed since the caller's last read; no body is re-sent.
    Unchanged,
    /// The body has been irreversibly erased.
    Wiped { wiped_at: DateTime<Utc> },
    /// The (possibly redacted) display text of the body.
    Body {
        content: String,
        updated_at: DateTime<Utc>,
    },
}

/// The run orchestrator.
///
/// Cheap to clone; collaborators are shared behind `Arc`.
#[derive(Clone)]
pub struct Orchestrator {
    workflows: Arc<dyn WorkflowStore>,
    runs: Arc<dyn RunStore>,
    dataclips: Arc<dyn DataclipStore>,
    dispatcher: Arc<dyn StepDispatcher>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    secrets: Arc<dyn SecretsProvider>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Creates an orchestrator with default configuration.
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        runs: Arc<dyn RunStore>,
        dataclips: Arc<dyn DataclipStore>,
        dispatcher: Arc<dyn StepDispatcher>,
        evaluator: Arc<dyn ExpressionEvaluator>,
        secrets: Arc<dyn SecretsProvider>,
    ) -> Self {
        Self {
            workflows,
            runs,
            dataclips,
            dispatcher,
            evaluator,
            secrets,
            config: OrchestratorConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Starts a run directly from a job, with an optional custom input.
    ///
    /// No trigger is recorded as the starting point; an empty payload is
    /// synthesized when the caller supplies none.
    ///
    /// # Errors
    ///
    /// Fails with `JobNotFound` if no workflow contains the job, and
    /// `WorkflowDeleted` if its workflow is soft-deleted.
    pub async fn start_run_from_job(
        &self,
        job_id: JobId,
        input: Option<JsonValue>,
    ) -> Result<RunHandle, OrchestratorError> {
        let workflow = self.workflows.find_by_job(job_id).await?;
        if workflow.is_deleted() {
            return Err(OrchestratorError::WorkflowDeleted {
                workflow_id: workflow.id,
            });
        }

        let snapshot = self.workflows.capture_snapshot(workflow.id).await?;
        let resolved = snapshot.resolve_start_node(StartTarget::Job(job_id))?;

        let dataclip = Dataclip::new(
            snapshot.project_id,
            DataclipType::SavedInput,
            input.unwrap_or_else(|| json!({})),
        );
        let dataclip_id = self.dataclips.create(dataclip).await?;

        self.begin(
            workflow.id,
            None,
            &snapshot,
            StartingNode::Job(resolved.job_id),
            resolved.job_id,
            dataclip_id,
        )
        .await
    }

    /// Starts a run from a trigger, optionally reusing an existing dataclip.
    ///
    /// # Errors
    ///
    /// Fails with `TriggerNotFound` if no workflow contains the trigger,
    /// `NoConnectedJob` if the trigger has no edge to an existing job, and
    /// `DataclipWiped` if the supplied dataclip has been erased.
    pub async fn start_run_from_trigger(
        &self,
        trigger_id: TriggerId,
        dataclip_id: Option<DataclipId>,
    ) -> Result<RunHandle, OrchestratorError> {
        let workflow = self.workflows.find_by_trigger(trigger_id).await?;
        if workflow.is_deleted() {
            return Err(OrchestratorError::WorkflowDeleted {
                workflow_id: workflow.id,
            });
        }

        let snapshot = self.workflows.capture_snapshot(workflow.id).await?;
        let resolved = snapshot.resolve_start_node(StartTarget::Trigger(trigger_id))?;

        let dataclip_id = match dataclip_id {
            Some(id) => {
                let dataclip = self.dataclips.get(id).await?;
                if dataclip.is_wiped() {
                    return Err(OrchestratorError::DataclipWiped { dataclip_id: id });
                }
                id
            }
            None => {
                let kind = match snapshot.trigger(trigger_id).map(Trigger::trigger_type) {
                    Some(TriggerType::Webhook) => DataclipType::HttpRequest,
                    Some(TriggerType::Cron) => DataclipType::Global,
                    Some(TriggerType::Manual) | None => DataclipType::SavedInput,
                };
                let dataclip = Dataclip::new(snapshot.project_id, kind, json!({}));
                self.dataclips.create(dataclip).await?
            }
        };

        self.begin(
            workflow.id,
            Some(trigger_id),
            &snapshot,
            StartingNode::Trigger(trigger_id),
            resolved.job_id,
            dataclip_id,
        )
        .await
    }

    /// Creates the work order, run, and first step, then hands the step off.
    async fn begin(
        &self,
        workflow_id: WorkflowId,
        trigger_id: Option<TriggerId>,
        snapshot: &Arc<Snapshot>,
        starting_node: StartingNode,
        first_job_id: JobId,
        dataclip_id: DataclipId,
    ) -> Result<RunHandle, OrchestratorError> {
        let mut order = WorkOrder::new(workflow_id, trigger_id, dataclip_id);
        let mut run = Run::new(order.id, snapshot.id, starting_node, dataclip_id);
        let step = Step::new(first_job_id, dataclip_id);
        order.mark_running();
        run.start();

        self.runs.create_work_order(order.clone()).await?;
        self.runs.create_run(run.clone()).await?;
        self.runs.add_step(run.id, step.clone()).await?;

        let job = snapshot
            .job(first_job_id)
            .cloned()
            .ok_or(OrchestratorError::JobNotFound {
                job_id: first_job_id,
            })?;
        self.dispatcher
            .dispatch(StepDispatch {
                run_id: run.id,
                step_id: step.id,
                job,
                input_dataclip_id: dataclip_id,
            })
            .await?;

        info!(run_id = %run.id, work_order_id = %order.id, job_id = %first_job_id, "run dispatched");
        Ok(RunHandle {
            work_order_id: order.id,
            run_id: run.id,
            dataclip_id,
        })
    }

    /// Handles a completion report from the external executor.
    ///
    /// A report without an exit reason means the step is still running; the
    /// step stays pending and nothing is recorded. Duplicate reports for an
    /// already-finished step are ignored.
    ///
    /// # Errors
    ///
    /// Fails with `RunNotFound`/`StepNotFound` when the report references
    /// unknown records.
    pub async fn handle_step_result(&self, result: StepResult) -> Result<(), OrchestratorError> {
        let Some(raw_exit) = result.exit_reason.as_deref() else {
            return Ok(());
        };
        let exit = ExitReason::normalize(raw_exit);

        let mut run = self.runs.get_run(result.run_id).await?;
        let steps = self.runs.steps_for_run(run.id).await?;
        let mut step = steps
            .iter()
            .find(|step| step.id == result.step_id)
            .cloned()
            .ok_or(OrchestratorError::StepNotFound {
                step_id: result.step_id,
            })?;
        if step.is_finished() {
            return Ok(());
        }

        let snapshot = self.workflows.get_snapshot(run.snapshot_id).await?;

        let output_payload = result.output;
        let output_dataclip_id = match &output_payload {
            Some(body) => {
                let dataclip =
                    Dataclip::new(snapshot.project_id, DataclipType::StepResult, body.clone());
                Some(self.dataclips.create(dataclip).await?)
            }
            None => None,
        };

        step.finish(exit, result.error_type, output_dataclip_id);
        self.runs.update_step(step.clone()).await?;
        debug!(run_id = %run.id, step_id = %step.id, exit = ?exit, "step finished");

        let targets = self
            .firing_targets(&snapshot, step.job_id, exit, output_payload.as_ref())
            .await?;

        if targets.is_empty() {
            self.maybe_finalize(&mut run).await?;
            return Ok(());
        }

        // The next step consumes this step's output; a job that produced
        // none passes its own input along unchanged.
        let next_input = step.output_dataclip_id.unwrap_or(step.input_dataclip_id);
        let mut dispatches = Vec::with_capacity(targets.len());
        for target_job_id in targets {
            let job =
                snapshot
                    .job(target_job_id)
                    .cloned()
                    .ok_or(OrchestratorError::JobNotFound {
                        job_id: target_job_id,
                    })?;
            let next = Step::new(target_job_id, next_input);
            self.runs.add_step(run.id, next.clone()).await?;
            dispatches.push(StepDispatch {
                run_id: run.id,
                step_id: next.id,
                job,
                input_dataclip_id: next_input,
            });
        }

        let outcomes = future::join_all(
            dispatches
                .into_iter()
                .map(|dispatch| self.dispatcher.dispatch(dispatch)),
        )
        .await;
        for outcome in outcomes {
            outcome?;
        }
        Ok(())
    }

    /// Decides which target jobs the completed step's edges fire at.
    ///
    /// Crashed steps propagate nothing. Ghost edges and edges without a
    /// target are never traversed.
    async fn firing_targets(
        &self,
        snapshot: &Snapshot,
        job_id: JobId,
        exit: ExitReason,
        result_payload: Option<&JsonValue>,
    ) -> Result<Vec<JobId>, OrchestratorError> {
        if exit == ExitReason::Crash {
            return Ok(Vec::new());
        }

        let mut targets = Vec::new();
        for edge in snapshot.outgoing_edges_from_job(job_id) {
            let fires = match &edge.condition {
                EdgeCondition::Always => true,
                EdgeCondition::OnSuccess => exit == ExitReason::Success,
                EdgeCondition::OnFailure => exit == ExitReason::Fail,
                EdgeCondition::JsExpression { expression } => {
                    let payload = result_payload.cloned().unwrap_or(JsonValue::Null);
                    self.evaluator.evaluate(expression, &payload).await?
                }
            };
            if !fires {
                continue;
            }
            let Some(target) = edge.target_job_id else {
                continue;
            };
            if !snapshot.contains_job(target) {
                continue;
            }
            targets.push(target);
        }
        Ok(targets)
    }

    /// Finalizes the run if every step has finished.
    ///
    /// A step that fired two branches leaves both in flight; the run stays
    /// running until the last branch reports back.
    async fn maybe_finalize(&self, run: &mut Run) -> Result<(), OrchestratorError> {
        let steps = self.runs.steps_for_run(run.id).await?;
        if !steps.iter().all(Step::is_finished) {
            return Ok(());
        }

        let exit_reasons: Vec<ExitReason> =
            steps.iter().filter_map(|step| step.exit_reason).collect();
        let state = derived_state(&exit_reasons);
        run.finish(state);
        self.runs.update_run(run.clone()).await?;

        let mut order = self.runs.get_work_order(run.work_order_id).await?;
        order.settle(state);
        self.runs.update_work_order(order).await?;
        info!(run_id = %run.id, state = ?state, "run finished");
        Ok(())
    }

    /// Creates a new run on the same work order, starting from a prior step.
    ///
    /// The new run binds a fresh snapshot at the workflow's current version,
    /// so graph edits made after the original failure take effect; the
    /// original run is left untouched.
    ///
    /// # Errors
    ///
    /// Fails with `MissingStepId` when no step is named, `RunNotFound`/
    /// `StepNotFound` for unknown records, `WorkflowDeleted` for a
    /// soft-deleted workflow, and `DataclipWiped` when the step's input has
    /// been erased.
    pub async fn retry_run(
        &self,
        run_id: RunId,
        step_id: Option<StepId>,
    ) -> Result<RunHandle, OrchestratorError> {
        // Validation first, before any state is read
        let step_id = step_id.ok_or(OrchestratorError::MissingStepId)?;

        let run = self.runs.get_run(run_id).await?;
        let steps = self.runs.steps_for_run(run_id).await?;
        let step = steps
            .into_iter()
            .find(|step| step.id == step_id)
            .ok_or(OrchestratorError::StepNotFound { step_id })?;

        let mut order = self.runs.get_work_order(run.work_order_id).await?;
        let workflow = self.workflows.get(order.workflow_id).await?;
        if workflow.is_deleted() {
            return Err(OrchestratorError::WorkflowDeleted {
                workflow_id: workflow.id,
            });
        }

        let dataclip = self.dataclips.get(step.input_dataclip_id).await?;
        if dataclip.is_wiped() {
            return Err(OrchestratorError::DataclipWiped {
                dataclip_id: dataclip.id,
            });
        }

        // Bind to the workflow's current version, not the original run's
        let snapshot = self.workflows.capture_snapshot(workflow.id).await?;
        let resolved = snapshot.resolve_start_node(StartTarget::Job(step.job_id))?;

        // A wipe may have raced the check above; re-check at the last
        // moment before the new run exists
        let dataclip = self.dataclips.get(step.input_dataclip_id).await?;
        if dataclip.is_wiped() {
            return Err(OrchestratorError::DataclipWiped {
                dataclip_id: dataclip.id,
            });
        }

        let mut new_run = Run::new(
            order.id,
            snapshot.id,
            StartingNode::Job(resolved.job_id),
            dataclip.id,
        );
        let new_step = Step::new(resolved.job_id, dataclip.id);
        order.mark_running();
        new_run.start();

        self.runs.create_run(new_run.clone()).await?;
        self.runs.add_step(new_run.id, new_step.clone()).await?;
        self.runs.update_work_order(order.clone()).await?;

        let job = snapshot
            .job(resolved.job_id)
            .cloned()
            .ok_or(OrchestratorError::JobNotFound {
                job_id: resolved.job_id,
            })?;
        self.dispatcher
            .dispatch(StepDispatch {
                run_id: new_run.id,
                step_id: new_step.id,
                job,
                input_dataclip_id: dataclip.id,
            })
            .await?;

        info!(
            run_id = %new_run.id,
            retried_from = %run_id,
            job_id = %resolved.job_id,
            "retry dispatched"
        );
        Ok(RunHandle {
            work_order_id: order.id,
            run_id: new_run.id,
            dataclip_id: dataclip.id,
        })
    }

    /// Returns a run's step for the given job.
    ///
    /// # Errors
    ///
    /// Fails with `StepNotFoundForJob` when the run never executed the job.
    pub async fn get_step(&self, run_id: RunId, job_id: JobId) -> Result<Step, OrchestratorError> {
        Ok(self.runs.step_for_job(run_id, job_id).await?)
    }

    /// Saves a workflow draft against an expected lock version.
    ///
    /// # Errors
    ///
    /// Fails with `VersionConflict` when the stored version moved on.
    pub async fn save_workflow(
        &self,
        workflow_id: WorkflowId,
        draft: WorkflowDraft,
        expected_lock_version: u64,
    ) -> Result<SaveReceipt, OrchestratorError> {
        Ok(self
            .workflows
            .save(workflow_id, draft, expected_lock_version)
            .await?)
    }

    /// Reads a dataclip for display, redacted for the given viewpoint.
    ///
    /// `seen_at` implements the conditional-read contract: when the clip has
    /// not changed since, `Unchanged` is returned and the body is neither
    /// serialized nor scrubbed. With a viewpoint step, every credential
    /// secret available to jobs at or before that step in its run is masked.
    ///
    /// # Errors
    ///
    /// Fails with `DataclipNotFound` for unknown clips.
    pub async fn read_dataclip(
        &self,
        dataclip_id: DataclipId,
        viewpoint_step_id: Option<StepId>,
        seen_at: Option<DateTime<Utc>>,
    ) -> Result<DataclipView, OrchestratorError> {
        let dataclip = self.dataclips.get(dataclip_id).await?;

        if let Some(seen) = seen_at
            && dataclip.updated_at <= seen
        {
            return Ok(DataclipView::Unchanged);
        }
        if let Some(wiped_at) = dataclip.wiped_at {
            return Ok(DataclipView::Wiped { wiped_at });
        }

        let body = dataclip.body.unwrap_or(JsonValue::Null);
        let scrubber = match viewpoint_step_id {
            Some(step_id) => self.scrubber_for_step(step_id).await?,
            None => Scrubber::default(),
        };

        Ok(DataclipView::Body {
            content: scrubber.scrub_json(&body),
            updated_at: dataclip.updated_at,
        })
    }

    /// Builds the redaction set for a viewpoint step.
    ///
    /// The set is the union of secrets of credentials attached to jobs whose
    /// steps started at or before the viewpoint within the same run. A later
    /// job's secret is not yet in scope and stays unmasked.
    async fn scrubber_for_step(&self, step_id: StepId) -> Result<Scrubber, OrchestratorError> {
        let run = self.runs.run_for_step(step_id).await?;
        let steps = self.runs.steps_for_run(run.id).await?;
        let position = steps
            .iter()
            .position(|step| step.id == step_id)
            .ok_or(OrchestratorError::StepNotFound { step_id })?;
        let snapshot = self.workflows.get_snapshot(run.snapshot_id).await?;

        let mut credential_ids = Vec::new();
        for step in &steps[..=position] {
            if let Some(job) = snapshot.job(step.job_id)
                && let Some(credential_id) = job.credential_id
                && !credential_ids.contains(&credential_id)
            {
                credential_ids.push(credential_id);
            }
        }

        let mut secrets = Vec::new();
        for credential_id in credential_ids {
            secrets.extend(self.secrets.secrets_for(credential_id).await?);
        }
        Ok(Scrubber::new(secrets))
    }

    /// Reaps unfinished steps older than the configured timeout.
    ///
    /// Swept steps complete with the raw reason `lost`, which the fixed
    /// mapping classifies as a crash. Without a configured timeout this is
    /// a no-op and steps may stay pending indefinitely.
    ///
    /// # Errors
    ///
    /// Propagates storage failures from the completion path.
    pub async fn sweep_lost_steps(&self) -> Result<usize, OrchestratorError> {
        let Some(timeout) = self.config.step_timeout() else {
            return Ok(0);
        };

        let cutoff = Utc::now() - timeout;
        let lost = self.runs.unfinished_steps_before(cutoff).await?;
        let count = lost.len();
        for (run_id, step_id) in lost {
            warn!(%run_id, %step_id, "step never reported back; reaping as lost");
            self.handle_step_result(StepResult {
                run_id,
                step_id,
                exit_reason: Some("lost".to_string()),
                error_type: Some("LostAfterTimeout".to_string()),
                output: None,
            })
            .await?;
        }
        Ok(count)
    }
}
