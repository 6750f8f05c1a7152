//! Immutable workflow snapshots.
//!
//! A snapshot is a point-in-time copy of a workflow's graph, captured when a
//! run is created. The run's behavior is fully determined by its snapshot:
//! edits to the live workflow after capture are invisible to it. Snapshots
//! are cheap to share across runs behind an `Arc`.

use crate::definition::Workflow;
use crate::edge::Edge;
use crate::error::GraphError;
use crate::graph::{self, ResolvedStart, StartTarget};
use crate::job::Job;
use crate::trigger::Trigger;
use amber_relay_core::{JobId, ProjectId, SnapshotId, TriggerId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An immutable copy of a workflow's graph at a specific lock version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique identifier for this snapshot.
    pub id: SnapshotId,
    /// The workflow this snapshot was captured from.
    pub workflow_id: WorkflowId,
    /// The project the workflow belongs to.
    pub project_id: ProjectId,
    /// The workflow's lock version at capture time.
    pub lock_version: u64,
    /// The workflow's name at capture time.
    pub name: String,
    /// The jobs of the graph, in stored order.
    pub jobs: Vec<Job>,
    /// The triggers of the graph, in stored order.
    pub triggers: Vec<Trigger>,
    /// The edges of the graph, in stored order.
    pub edges: Vec<Edge>,
    /// When this snapshot was captured.
    pub inserted_at: DateTime<Utc>,
    /// Map from JobId to position in `jobs` for O(1) lookup.
    #[serde(skip)]
    job_index: HashMap<JobId, usize>,
    /// Map from TriggerId to position in `triggers` for O(1) lookup.
    #[serde(skip)]
    trigger_index: HashMap<TriggerId, usize>,
}

impl Snapshot {
    /// Captures a snapshot of the given workflow.
    #[must_use]
    pub fn capture(workflow: &Workflow) -> Self {
        let mut snapshot = Self {
            id: SnapshotId::new(),
            workflow_id: workflow.id,
            project_id: workflow.project_id,
            lock_version: workflow.lock_version,
            name: workflow.name.clone(),
            jobs: workflow.jobs.clone(),
            triggers: workflow.triggers.clone(),
            edges: workflow.edges.clone(),
            inserted_at: Utc::now(),
            job_index: HashMap::new(),
            trigger_index: HashMap::new(),
        };
        snapshot.rebuild_index();
        snapshot
    }

    /// Rebuilds the lookup indexes after deserialization.
    pub fn rebuild_index(&mut self) {
        self.job_index = self
            .jobs
            .iter()
            .enumerate()
            .map(|(position, job)| (job.id, position))
            .collect();
        self.trigger_index = self
            .triggers
            .iter()
            .enumerate()
            .map(|(position, trigger)| (trigger.id, position))
            .collect();
    }

    /// Returns a reference to a job by its ID.
    #[must_use]
    pub fn job(&self, job_id: JobId) -> Option<&Job> {
        self.job_index.get(&job_id).map(|&position| &self.jobs[position])
    }

    /// Returns a reference to a trigger by its ID.
    #[must_use]
    pub fn trigger(&self, trigger_id: TriggerId) -> Option<&Trigger> {
        self.trigger_index
            .get(&trigger_id)
            .map(|&position| &self.triggers[position])
    }

    /// Returns true if the snapshot contains the given job.
    #[must_use]
    pub fn contains_job(&self, job_id: JobId) -> bool {
        self.job_index.contains_key(&job_id)
    }

    /// Returns the enabled edges leaving the given job, in stored order.
    #[must_use]
    pub fn outgoing_edges_from_job(&self, job_id: JobId) -> Vec<&Edge> {
        graph::outgoing_edges_from_job(&self.edges, job_id)
    }

    /// Returns the enabled edges leaving the given trigger, in stored order.
    #[must_use]
    pub fn outgoing_edges_from_trigger(&self, trigger_id: TriggerId) -> Vec<&Edge> {
        graph::outgoing_edges_from_trigger(&self.edges, trigger_id)
    }

    /// Resolves the start node for an execution against this snapshot.
    ///
    /// # Errors
    ///
    /// See [`graph::resolve_start_node`].
    pub fn resolve_start_node(&self, target: StartTarget) -> Result<ResolvedStart, GraphError> {
        graph::resolve_start_node(&self.jobs, &self.triggers, &self.edges, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_workflow() -> (Workflow, TriggerId, JobId) {
        let mut workflow = Workflow::new(ProjectId::new(), "Snapshot me");
        let trigger = workflow.add_trigger(Trigger::webhook());
        let job = workflow.add_job(Job::new("a", "language-common@2.0.0"));
        workflow.add_edge(Edge::from_trigger(trigger, job));
        (workflow, trigger, job)
    }

    #[test]
    fn capture_copies_graph_and_version() {
        let (workflow, trigger_id, job_id) = sample_workflow();
        let snapshot = Snapshot::capture(&workflow);

        assert_eq!(snapshot.workflow_id, workflow.id);
        assert_eq!(snapshot.lock_version, workflow.lock_version);
        assert!(snapshot.job(job_id).is_some());
        assert!(snapshot.trigger(trigger_id).is_some());
        assert_eq!(snapshot.edges.len(), 1);
    }

    #[test]
    fn snapshot_is_isolated_from_later_edits() {
        let (mut workflow, _, job_id) = sample_workflow();
        let snapshot = Snapshot::capture(&workflow);

        workflow.jobs.clear();
        workflow.name = "Renamed".to_string();

        assert!(snapshot.contains_job(job_id));
        assert_eq!(snapshot.name, "Snapshot me");
    }

    #[test]
    fn resolve_start_node_against_snapshot() {
        let (workflow, trigger_id, job_id) = sample_workflow();
        let snapshot = Snapshot::capture(&workflow);

        let resolved = snapshot
            .resolve_start_node(StartTarget::Trigger(trigger_id))
            .expect("should resolve");
        assert_eq!(resolved.job_id, job_id);
    }

    #[test]
    fn serde_roundtrip_with_index_rebuild() {
        let (workflow, _, job_id) = sample_workflow();
        let snapshot = Snapshot::capture(&workflow);

        let json = serde_json::to_string(&snapshot).expect("serialize");
        let mut parsed: Snapshot = serde_json::from_str(&json).expect("deserialize");
        assert!(parsed.job(job_id).is_none()); // index not rebuilt yet

        parsed.rebuild_index();
        assert!(parsed.job(job_id).is_some());
        assert_eq!(parsed.id, snapshot.id);
    }
}
