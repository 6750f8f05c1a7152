//! Headless dev harness for the amber-relay orchestration engine.
//!
//! Wires the in-memory stores to the orchestrator, registers a demo
//! workflow, and drives one work order end to end with an in-process
//! executor. Step outputs are read back through the redaction engine so the
//! full chain is exercised without any external service.

mod config;

use crate::config::EngineConfig;
use amber_relay_core::ProjectId;
use amber_relay_orchestrator::{
    DataclipView, DispatchError, EvalError, ExpressionEvaluator, InMemoryDataclipStore,
    InMemoryRunStore, Orchestrator, RunStore, StepDispatch, StepDispatcher, StepResult,
};
use amber_relay_redaction::{Credential, InMemorySecretsProvider};
use amber_relay_workflow::{
    Edge, EdgeCondition, InMemoryWorkflowStore, Job, Trigger, Workflow, WorkflowStore,
};
use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Hands dispatched steps to the in-process demo executor over a channel.
struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<StepDispatch>,
}

#[async_trait]
impl StepDispatcher for ChannelDispatcher {
    async fn dispatch(&self, dispatch: StepDispatch) -> Result<(), DispatchError> {
        self.tx
            .send(dispatch)
            .map_err(|e| DispatchError::QueueUnavailable {
                message: e.to_string(),
            })
    }
}

/// Dev stand-in for the external expression sandbox.
struct PermissiveEvaluator;

#[async_trait]
impl ExpressionEvaluator for PermissiveEvaluator {
    async fn evaluate(&self, expression: &str, _result: &JsonValue) -> Result<bool, EvalError> {
        tracing::debug!(expression, "expression evaluated permissively");
        Ok(true)
    }
}

#[tokio::main]
async fn main() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let engine_config = EngineConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let workflows = Arc::new(InMemoryWorkflowStore::new());
    let runs = Arc::new(InMemoryRunStore::new());
    let dataclips = Arc::new(InMemoryDataclipStore::new());
    let secrets = Arc::new(InMemorySecretsProvider::new());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let orchestrator = Orchestrator::new(
        workflows.clone(),
        runs.clone(),
        dataclips.clone(),
        Arc::new(ChannelDispatcher { tx }),
        Arc::new(PermissiveEvaluator),
        secrets.clone(),
    )
    .with_config(engine_config.orchestrator.clone());

    // Periodic lost-step sweep
    let sweeper = orchestrator.clone();
    let sweep_interval = engine_config.orchestrator.sweep_interval_seconds;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(sweep_interval));
        loop {
            interval.tick().await;
            match sweeper.sweep_lost_steps().await {
                Ok(count) if count > 0 => tracing::warn!(reaped = count, "swept lost steps"),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "lost-step sweep failed"),
            }
        }
    });

    // Demo workflow: webhook -> fetch -> transform (on success)
    let credential = Credential::new("demo api key", json!({"api_key": "sk_live_demo_123456"}));
    let credential_id = credential.id;
    secrets.insert(credential).await;

    let mut workflow = Workflow::new(ProjectId::new(), "Demo sync");
    let trigger_id = workflow.add_trigger(Trigger::webhook());
    let fetch = workflow.add_job(
        Job::new("Fetch records", "language-http@5.0.0").with_credential(credential_id),
    );
    let transform = workflow.add_job(Job::new("Transform records", "language-common@2.0.0"));
    workflow.add_edge(Edge::from_trigger(trigger_id, fetch));
    workflow.add_edge(Edge::from_job(fetch, transform, EdgeCondition::OnSuccess));
    workflows
        .insert(workflow)
        .await
        .expect("failed to register demo workflow");

    let handle = orchestrator
        .start_run_from_trigger(trigger_id, None)
        .await
        .expect("failed to start demo run");
    tracing::info!(run_id = %handle.run_id, "demo run started");

    // In-process executor: pretend to run each dispatched step
    while let Some(dispatch) = rx.recv().await {
        tracing::info!(job = %dispatch.job.name, step_id = %dispatch.step_id, "executing step");
        let output = json!({
            "job": dispatch.job.name,
            "api_key_used": "sk_live_demo_123456",
            "rows": 3,
        });
        orchestrator
            .handle_step_result(StepResult {
                run_id: dispatch.run_id,
                step_id: dispatch.step_id,
                exit_reason: Some("success".to_string()),
                error_type: None,
                output: Some(output),
            })
            .await
            .expect("failed to record step completion");

        let run = runs.get_run(handle.run_id).await.expect("run should exist");
        if run.state.is_terminal() {
            tracing::info!(state = ?run.state, "demo run finished");
            break;
        }
    }

    // Read the first step's output through the redaction engine; the demo
    // credential's key must come back masked
    let step = orchestrator
        .get_step(handle.run_id, fetch)
        .await
        .expect("fetch step should exist");
    if let Some(output_id) = step.output_dataclip_id {
        match orchestrator
            .read_dataclip(output_id, Some(step.id), None)
            .await
            .expect("failed to read dataclip")
        {
            DataclipView::Body { content, .. } => {
                tracing::info!("redacted step output:\n{content}");
            }
            view => tracing::info!(?view, "step output unavailable"),
        }
    }
}
