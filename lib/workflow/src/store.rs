//! Workflow persistence interface and in-memory implementation.
//!
//! The store is the optimistic-concurrency guard for workflow saves: every
//! save presents the lock version it was read at and commits with a single
//! compare-and-set, scoped to one workflow. Snapshot capture happens under
//! the same guard, so a snapshot can never mix pre- and post-commit graph
//! state.
//!
//! A separate real-time co-editing channel may also write through this
//! interface; it is just another caller presenting a version.

use crate::definition::{Workflow, WorkflowDraft};
use crate::error::StoreError;
use crate::snapshot::Snapshot;
use amber_relay_core::{JobId, SnapshotId, TriggerId, WorkflowId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// The result of an accepted save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReceipt {
    /// The new lock version. Callers must re-sync from the store rather
    /// than assume their in-memory copy matches the committed state.
    pub lock_version: u64,
    /// When the save was committed.
    pub saved_at: DateTime<Utc>,
}

/// Trait for workflow persistence.
///
/// This abstraction keeps the orchestrator independent of storage
/// technology; the in-memory implementation below doubles as the test
/// harness and the dev-mode backend.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Registers a new workflow.
    async fn insert(&self, workflow: Workflow) -> Result<(), StoreError>;

    /// Loads a workflow by id.
    async fn get(&self, workflow_id: WorkflowId) -> Result<Workflow, StoreError>;

    /// Saves a draft against the expected lock version.
    ///
    /// Commits atomically: if the stored version differs from
    /// `expected_lock_version` at commit time the save fails with
    /// `VersionConflict` and nothing is merged. On success the stored
    /// version increments by exactly one.
    async fn save(
        &self,
        workflow_id: WorkflowId,
        draft: WorkflowDraft,
        expected_lock_version: u64,
    ) -> Result<SaveReceipt, StoreError>;

    /// Captures an immutable snapshot of the workflow's current graph.
    async fn capture_snapshot(&self, workflow_id: WorkflowId) -> Result<Arc<Snapshot>, StoreError>;

    /// Loads a previously captured snapshot.
    async fn get_snapshot(&self, snapshot_id: SnapshotId) -> Result<Arc<Snapshot>, StoreError>;

    /// Soft-deletes a workflow.
    async fn soft_delete(&self, workflow_id: WorkflowId) -> Result<(), StoreError>;

    /// Finds the workflow containing the given job.
    async fn find_by_job(&self, job_id: JobId) -> Result<Workflow, StoreError>;

    /// Finds the workflow containing the given trigger.
    async fn find_by_trigger(&self, trigger_id: TriggerId) -> Result<Workflow, StoreError>;
}

/// In-memory workflow store.
///
/// One mutex guards workflows and snapshots together, which makes the
/// compare-and-set and snapshot capture trivially atomic. Real deployments
/// would scope the transaction per workflow row; a single lock gives the
/// same observable guarantees here.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    workflows: HashMap<WorkflowId, Workflow>,
    snapshots: HashMap<SnapshotId, Arc<Snapshot>>,
}

impl InMemoryWorkflowStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn insert(&self, workflow: Workflow) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.workflows.insert(workflow.id, workflow);
        Ok(())
    }

    async fn get(&self, workflow_id: WorkflowId) -> Result<Workflow, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .workflows
            .get(&workflow_id)
            .cloned()
            .ok_or(StoreError::WorkflowNotFound { workflow_id })
    }

    async fn save(
        &self,
        workflow_id: WorkflowId,
        draft: WorkflowDraft,
        expected_lock_version: u64,
    ) -> Result<SaveReceipt, StoreError> {
        let mut inner = self.inner.lock().await;
        let workflow = inner
            .workflows
            .get_mut(&workflow_id)
            .ok_or(StoreError::WorkflowNotFound { workflow_id })?;

        if workflow.is_deleted() {
            return Err(StoreError::WorkflowDeleted { workflow_id });
        }
        if workflow.lock_version != expected_lock_version {
            debug!(
                %workflow_id,
                expected = expected_lock_version,
                actual = workflow.lock_version,
                "rejecting stale workflow save"
            );
            return Err(StoreError::VersionConflict {
                workflow_id,
                expected: expected_lock_version,
                actual: workflow.lock_version,
            });
        }

        workflow.apply_draft(draft);
        workflow.lock_version += 1;
        let receipt = SaveReceipt {
            lock_version: workflow.lock_version,
            saved_at: workflow.updated_at,
        };
        debug!(%workflow_id, lock_version = receipt.lock_version, "workflow saved");
        Ok(receipt)
    }

    async fn capture_snapshot(&self, workflow_id: WorkflowId) -> Result<Arc<Snapshot>, StoreError> {
        let mut inner = self.inner.lock().await;
        let workflow = inner
            .workflows
            .get(&workflow_id)
            .ok_or(StoreError::WorkflowNotFound { workflow_id })?;

        let snapshot = Arc::new(Snapshot::capture(workflow));
        inner.snapshots.insert(snapshot.id, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    async fn get_snapshot(&self, snapshot_id: SnapshotId) -> Result<Arc<Snapshot>, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .snapshots
            .get(&snapshot_id)
            .cloned()
            .ok_or(StoreError::SnapshotNotFound { snapshot_id })
    }

    async fn soft_delete(&self, workflow_id: WorkflowId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let workflow = inner
            .workflows
            .get_mut(&workflow_id)
            .ok_or(StoreError::WorkflowNotFound { workflow_id })?;
        workflow.soft_delete();
        Ok(())
    }

    async fn find_by_job(&self, job_id: JobId) -> Result<Workflow, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .workflows
            .values()
            .find(|workflow| workflow.job(job_id).is_some())
            .cloned()
            .ok_or(StoreError::JobNotFound { job_id })
    }

    async fn find_by_trigger(&self, trigger_id: TriggerId) -> Result<Workflow, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .workflows
            .values()
            .find(|workflow| workflow.trigger(trigger_id).is_some())
            .cloned()
            .ok_or(StoreError::TriggerNotFound { trigger_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::job::Job;
    use crate::trigger::Trigger;
    use amber_relay_core::ProjectId;

    async fn seeded_store() -> (InMemoryWorkflowStore, Workflow) {
        let mut workflow = Workflow::new(ProjectId::new(), "Versioned");
        let trigger = workflow.add_trigger(Trigger::webhook());
        let job = workflow.add_job(Job::new("a", "language-common@2.0.0"));
        workflow.add_edge(Edge::from_trigger(trigger, job));

        let store = InMemoryWorkflowStore::new();
        store.insert(workflow.clone()).await.expect("insert");
        (store, workflow)
    }

    #[tokio::test]
    async fn save_with_correct_version_increments_by_one() {
        let (store, workflow) = seeded_store().await;
        let draft = WorkflowDraft::from_workflow(&workflow);

        let receipt = store
            .save(workflow.id, draft, workflow.lock_version)
            .await
            .expect("should save");
        assert_eq!(receipt.lock_version, workflow.lock_version + 1);

        let stored = store.get(workflow.id).await.expect("should load");
        assert_eq!(stored.lock_version, receipt.lock_version);
    }

    #[tokio::test]
    async fn stale_save_is_rejected_and_not_merged() {
        let (store, workflow) = seeded_store().await;
        let version = workflow.lock_version;

        let mut renamed = workflow.clone();
        renamed.name = "First writer".to_string();
        store
            .save(workflow.id, WorkflowDraft::from_workflow(&renamed), version)
            .await
            .expect("first save should win");

        let mut stale = workflow.clone();
        stale.name = "Second writer".to_string();
        let err = store
            .save(workflow.id, WorkflowDraft::from_workflow(&stale), version)
            .await
            .expect_err("second save should conflict");
        match err {
            StoreError::VersionConflict { expected, actual, .. } => {
                assert_eq!(expected, version);
                assert_eq!(actual, version + 1);
            }
            other => panic!("unexpected error: {other}"),
        }

        let stored = store.get(workflow.id).await.expect("should load");
        assert_eq!(stored.name, "First writer");
    }

    #[tokio::test]
    async fn save_to_deleted_workflow_is_rejected() {
        let (store, workflow) = seeded_store().await;
        store.soft_delete(workflow.id).await.expect("should delete");

        let err = store
            .save(
                workflow.id,
                WorkflowDraft::from_workflow(&workflow),
                workflow.lock_version,
            )
            .await
            .expect_err("should reject");
        assert!(matches!(err, StoreError::WorkflowDeleted { .. }));
    }

    #[tokio::test]
    async fn snapshot_reflects_version_at_capture_time() {
        let (store, workflow) = seeded_store().await;

        let snapshot = store
            .capture_snapshot(workflow.id)
            .await
            .expect("should capture");
        assert_eq!(snapshot.lock_version, workflow.lock_version);

        let mut renamed = workflow.clone();
        renamed.name = "Edited later".to_string();
        store
            .save(
                workflow.id,
                WorkflowDraft::from_workflow(&renamed),
                workflow.lock_version,
            )
            .await
            .expect("should save");

        let reloaded = store
            .get_snapshot(snapshot.id)
            .await
            .expect("should load snapshot");
        assert_eq!(reloaded.name, "Versioned");
        assert_eq!(reloaded.lock_version, workflow.lock_version);
    }

    #[tokio::test]
    async fn find_by_job_and_trigger() {
        let (store, workflow) = seeded_store().await;
        let job_id = workflow.jobs[0].id;
        let trigger_id = workflow.triggers[0].id;

        let by_job = store.find_by_job(job_id).await.expect("should find");
        assert_eq!(by_job.id, workflow.id);

        let by_trigger = store.find_by_trigger(trigger_id).await.expect("should find");
        assert_eq!(by_trigger.id, workflow.id);

        let err = store.find_by_job(JobId::new()).await.expect_err("missing");
        assert!(matches!(err, StoreError::JobNotFound { .. }));
    }
}
