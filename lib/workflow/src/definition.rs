//! Workflow definition types.
//!
//! A workflow is the live, editable aggregate: a named graph of triggers,
//! jobs, and edges guarded by an optimistic lock version. Executions never
//! read this aggregate directly; they bind to a [`Snapshot`] taken at run
//! creation time.
//!
//! [`Snapshot`]: crate::snapshot::Snapshot

use crate::edge::Edge;
use crate::error::GraphError;
use crate::graph;
use crate::job::Job;
use crate::trigger::Trigger;
use amber_relay_core::{EdgeId, JobId, ProjectId, TriggerId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A live workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier for this workflow.
    pub id: WorkflowId,
    /// The project this workflow belongs to.
    pub project_id: ProjectId,
    /// Human-readable name.
    pub name: String,
    /// Optimistic concurrency counter. Strictly increases on every accepted
    /// save; a stale version is rejected, never merged.
    pub lock_version: u64,
    /// The jobs of the graph, in stored order.
    pub jobs: Vec<Job>,
    /// The triggers of the graph, in stored order.
    pub triggers: Vec<Trigger>,
    /// The edges of the graph, in stored order.
    pub edges: Vec<Edge>,
    /// Node display positions keyed by node id. Opaque to the engine.
    #[serde(default)]
    pub positions: HashMap<String, JsonValue>,
    /// Soft-delete marker. A deleted workflow refuses new executions.
    pub deleted_at: Option<DateTime<Utc>>,
    /// When this workflow was created.
    pub inserted_at: DateTime<Utc>,
    /// When this workflow was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Creates a new empty workflow at lock version 1.
    #[must_use]
    pub fn new(project_id: ProjectId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::new(),
            project_id,
            name: name.into(),
            lock_version: 1,
            jobs: Vec::new(),
            triggers: Vec::new(),
            edges: Vec::new(),
            positions: HashMap::new(),
            deleted_at: None,
            inserted_at: now,
            updated_at: now,
        }
    }

    /// Adds a job to the graph, returning its id.
    pub fn add_job(&mut self, job: Job) -> JobId {
        let id = job.id;
        self.jobs.push(job);
        id
    }

    /// Adds a trigger to the graph, returning its id.
    pub fn add_trigger(&mut self, trigger: Trigger) -> TriggerId {
        let id = trigger.id;
        self.triggers.push(trigger);
        id
    }

    /// Adds an edge to the graph, returning its id.
    pub fn add_edge(&mut self, edge: Edge) -> EdgeId {
        let id = edge.id;
        self.edges.push(edge);
        id
    }

    /// Returns a reference to a job by its ID.
    #[must_use]
    pub fn job(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == job_id)
    }

    /// Returns a reference to a trigger by its ID.
    #[must_use]
    pub fn trigger(&self, trigger_id: TriggerId) -> Option<&Trigger> {
        self.triggers.iter().find(|trigger| trigger.id == trigger_id)
    }

    /// Returns true if this workflow has been soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Marks this workflow as deleted. Idempotent; the original deletion
    /// time is kept.
    pub fn soft_delete(&mut self) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(Utc::now());
        }
    }

    /// Validates the workflow graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph has duplicate node ids, ghost edges,
    /// or cycles.
    pub fn validate(&self) -> Result<(), GraphError> {
        graph::validate(&self.jobs, &self.triggers, &self.edges)
    }

    /// Replaces the editable content of this workflow with the draft.
    ///
    /// The lock version is untouched; bumping it is the store's job at
    /// commit time.
    pub fn apply_draft(&mut self, draft: WorkflowDraft) {
        self.name = draft.name;
        self.jobs = draft.jobs;
        self.triggers = draft.triggers;
        self.edges = draft.edges;
        self.positions = draft.positions;
        self.updated_at = Utc::now();
    }

    /// Marks the workflow as updated (bumps updated_at timestamp).
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// The editable content of a workflow, as submitted by a save request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDraft {
    /// Workflow name.
    pub name: String,
    /// The full job set.
    pub jobs: Vec<Job>,
    /// The full trigger set.
    pub triggers: Vec<Trigger>,
    /// The full edge set.
    pub edges: Vec<Edge>,
    /// Node display positions. Opaque to the engine.
    #[serde(default)]
    pub positions: HashMap<String, JsonValue>,
}

impl WorkflowDraft {
    /// Builds a draft from the current state of a workflow.
    #[must_use]
    pub fn from_workflow(workflow: &Workflow) -> Self {
        Self {
            name: workflow.name.clone(),
            jobs: workflow.jobs.clone(),
            triggers: workflow.triggers.clone(),
            edges: workflow.edges.clone(),
            positions: workflow.positions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgeCondition;

    #[test]
    fn workflow_creation() {
        let workflow = Workflow::new(ProjectId::new(), "Patient sync");
        assert_eq!(workflow.name, "Patient sync");
        assert_eq!(workflow.lock_version, 1);
        assert!(!workflow.is_deleted());
        assert!(workflow.jobs.is_empty());
    }

    #[test]
    fn add_and_look_up_nodes() {
        let mut workflow = Workflow::new(ProjectId::new(), "Lookup");
        let job_id = workflow.add_job(Job::new("a", "language-common@2.0.0"));
        let trigger_id = workflow.add_trigger(Trigger::webhook());

        assert_eq!(workflow.job(job_id).map(|job| &job.name[..]), Some("a"));
        assert!(workflow.trigger(trigger_id).is_some());
        assert!(workflow.job(JobId::new()).is_none());
    }

    #[test]
    fn soft_delete_keeps_first_timestamp() {
        let mut workflow = Workflow::new(ProjectId::new(), "Delete me");
        workflow.soft_delete();
        let first = workflow.deleted_at;
        assert!(first.is_some());

        workflow.soft_delete();
        assert_eq!(workflow.deleted_at, first);
    }

    #[test]
    fn validate_delegates_to_graph() {
        let mut workflow = Workflow::new(ProjectId::new(), "Cyclic");
        let a = workflow.add_job(Job::new("a", "language-common@2.0.0"));
        let b = workflow.add_job(Job::new("b", "language-common@2.0.0"));
        workflow.add_edge(Edge::from_job(a, b, EdgeCondition::Always));
        workflow.add_edge(Edge::from_job(b, a, EdgeCondition::Always));

        assert_eq!(workflow.validate(), Err(GraphError::CycleDetected));
    }

    #[test]
    fn apply_draft_replaces_content_but_not_version() {
        let mut workflow = Workflow::new(ProjectId::new(), "Before");
        workflow.add_job(Job::new("old", "language-common@2.0.0"));

        let mut replacement = Workflow::new(ProjectId::new(), "After");
        replacement.add_job(Job::new("new", "language-http@5.0.0"));
        let draft = WorkflowDraft::from_workflow(&replacement);

        workflow.apply_draft(draft);
        assert_eq!(workflow.name, "After");
        assert_eq!(workflow.jobs.len(), 1);
        assert_eq!(workflow.jobs[0].name, "new");
        assert_eq!(workflow.lock_version, 1);
    }

    #[test]
    fn workflow_serde_roundtrip() {
        let mut workflow = Workflow::new(ProjectId::new(), "Serde");
        let trigger = workflow.add_trigger(Trigger::cron("0 7 * * *"));
        let job = workflow.add_job(Job::new("a", "language-common@2.0.0"));
        workflow.add_edge(Edge::from_trigger(trigger, job));

        let json = serde_json::to_string(&workflow).expect("serialize");
        let parsed: Workflow = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(workflow, parsed);
    }
}
