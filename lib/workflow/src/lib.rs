//! Workflow graph model for the amber-relay platform.
//!
//! This crate provides the editable workflow aggregate and its execution
//! view, including:
//!
//! - **Domain types**: jobs, triggers, and conditional edges with a
//!   single-source tagged union
//! - **Graph Model**: pure, order-preserving traversal, ghost-edge
//!   partitioning, and start-node resolution
//! - **Snapshots**: immutable per-run copies of a workflow's graph
//! - **Store**: optimistic-concurrency saves guarded by a lock version

pub mod definition;
pub mod edge;
pub mod error;
pub mod graph;
pub mod job;
pub mod snapshot;
pub mod store;
pub mod trigger;

pub use definition::{Workflow, WorkflowDraft};
pub use edge::{Edge, EdgeCondition, EdgeRecord, EdgeSource};
pub use error::{GraphError, StoreError};
pub use graph::{ResolvedStart, StartTarget};
pub use job::Job;
pub use snapshot::Snapshot;
pub use store::{InMemoryWorkflowStore, SaveReceipt, WorkflowStore};
pub use trigger::{Trigger, TriggerConfig, TriggerType};
