//! Core domain types and utilities for the amber-relay platform.
//!
//! This crate provides the foundational ID types, error handling, and shared
//! utilities used throughout the amber-relay pipeline automation engine.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{
    CredentialId, DataclipId, EdgeId, JobId, ProjectId, RunId, SnapshotId, StepId, TriggerId,
    WorkOrderId, WorkflowId,
};
