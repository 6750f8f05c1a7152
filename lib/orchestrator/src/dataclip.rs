//! Dataclips: stored JSON payloads used as step inputs and outputs.
//!
//! A dataclip may be wiped for retention or security. Wiping is one-way:
//! the body is erased and must be treated as absent from then on. Readers
//! racing a wipe see either the prior body or the wiped clip, never a torn
//! body.

use amber_relay_core::{DataclipId, ProjectId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;

/// How a dataclip came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataclipType {
    /// Captured from an inbound webhook request.
    HttpRequest,
    /// Created by a scheduled (cron) invocation.
    Global,
    /// Produced as a step's output.
    StepResult,
    /// Supplied by a user for a manual run.
    SavedInput,
}

/// A stored JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataclip {
    /// Unique identifier.
    pub id: DataclipId,
    /// The project this dataclip belongs to.
    pub project_id: ProjectId,
    /// How this dataclip came to exist.
    #[serde(rename = "type")]
    pub kind: DataclipType,
    /// The payload. `None` once wiped.
    pub body: Option<JsonValue>,
    /// When the body was erased. Once set, the body is gone for good.
    pub wiped_at: Option<DateTime<Utc>>,
    /// Optional human-readable label.
    pub name: Option<String>,
    /// When this dataclip was created.
    pub inserted_at: DateTime<Utc>,
    /// When this dataclip last changed (creation or wipe).
    pub updated_at: DateTime<Utc>,
}

impl Dataclip {
    /// Creates a new dataclip with the given body.
    #[must_use]
    pub fn new(project_id: ProjectId, kind: DataclipType, body: JsonValue) -> Self {
        let now = Utc::now();
        Self {
            id: DataclipId::new(),
            project_id,
            kind,
            body: Some(body),
            wiped_at: None,
            name: None,
            inserted_at: now,
            updated_at: now,
        }
    }

    /// Sets a label.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns true if the body has been erased.
    #[must_use]
    pub fn is_wiped(&self) -> bool {
        self.wiped_at.is_some()
    }

    /// Erases the body. Idempotent; the first wipe time is kept.
    pub fn wipe(&mut self) {
        self.body = None;
        if self.wiped_at.is_none() {
            let now = Utc::now();
            self.wiped_at = Some(now);
            self.updated_at = now;
        }
    }
}

/// Errors from dataclip storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataclipError {
    /// Dataclip not found.
    NotFound { dataclip_id: DataclipId },
}

impl fmt::Display for DataclipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { dataclip_id } => write!(f, "dataclip not found: {dataclip_id}"),
        }
    }
}

impl std::error::Error for DataclipError {}

/// Trait for dataclip persistence.
///
/// The orchestrator treats the store as a black box satisfying a small
/// contract: create, read, wipe. Wipes must be atomic with respect to
/// concurrent reads.
#[async_trait]
pub trait DataclipStore: Send + Sync {
    /// Stores a dataclip and returns its id.
    async fn create(&self, dataclip: Dataclip) -> Result<DataclipId, DataclipError>;

    /// Loads a dataclip by id.
    async fn get(&self, dataclip_id: DataclipId) -> Result<Dataclip, DataclipError>;

    /// Erases a dataclip's body. One-way.
    async fn wipe(&self, dataclip_id: DataclipId) -> Result<(), DataclipError>;
}

/// In-memory dataclip store.
#[derive(Default)]
pub struct InMemoryDataclipStore {
    dataclips: Mutex<HashMap<DataclipId, Dataclip>>,
}

impl InMemoryDataclipStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataclipStore for InMemoryDataclipStore {
    async fn create(&self, dataclip: Dataclip) -> Result<DataclipId, DataclipError> {
        let id = dataclip.id;
        let mut dataclips = self.dataclips.lock().await;
        dataclips.insert(id, dataclip);
        Ok(id)
    }

    async fn get(&self, dataclip_id: DataclipId) -> Result<Dataclip, DataclipError> {
        let dataclips = self.dataclips.lock().await;
        dataclips
            .get(&dataclip_id)
            .cloned()
            .ok_or(DataclipError::NotFound { dataclip_id })
    }

    async fn wipe(&self, dataclip_id: DataclipId) -> Result<(), DataclipError> {
        let mut dataclips = self.dataclips.lock().await;
        let dataclip = dataclips
            .get_mut(&dataclip_id)
            .ok_or(DataclipError::NotFound { dataclip_id })?;
        dataclip.wipe();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wipe_is_one_way_and_idempotent() {
        let mut dataclip = Dataclip::new(
            ProjectId::new(),
            DataclipType::HttpRequest,
            json!({"data": "test"}),
        );
        assert!(!dataclip.is_wiped());

        dataclip.wipe();
        let first = dataclip.wiped_at;
        assert!(dataclip.is_wiped());
        assert!(dataclip.body.is_none());

        dataclip.wipe();
        assert_eq!(dataclip.wiped_at, first);
    }

    #[tokio::test]
    async fn store_round_trip() {
        let store = InMemoryDataclipStore::new();
        let dataclip = Dataclip::new(ProjectId::new(), DataclipType::SavedInput, json!({"a": 1}));
        let id = store.create(dataclip).await.expect("create");

        let loaded = store.get(id).await.expect("get");
        assert_eq!(loaded.body, Some(json!({"a": 1})));

        store.wipe(id).await.expect("wipe");
        let wiped = store.get(id).await.expect("get after wipe");
        assert!(wiped.is_wiped());
        assert!(wiped.body.is_none());
    }

    #[tokio::test]
    async fn missing_dataclip_errors() {
        let store = InMemoryDataclipStore::new();
        let dataclip_id = DataclipId::new();
        let err = store.get(dataclip_id).await.expect_err("missing");
        assert_eq!(err, DataclipError::NotFound { dataclip_id });
    }

    #[test]
    fn dataclip_serde_uses_type_field() {
        let dataclip = Dataclip::new(ProjectId::new(), DataclipType::Global, json!({}));
        let json = serde_json::to_value(&dataclip).expect("serialize");
        assert_eq!(json["type"], "global");
    }
}
