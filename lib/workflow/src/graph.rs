//! Pure traversal and validity checks over a workflow graph.
//!
//! Jobs, triggers, and edges live in flat id-indexed collections; every
//! function here is stateless and order-preserving with respect to the stored
//! edge list. These operations are shared by the live [`Workflow`] aggregate
//! and the immutable [`Snapshot`] bound to a run.
//!
//! [`Workflow`]: crate::definition::Workflow
//! [`Snapshot`]: crate::snapshot::Snapshot

use crate::edge::Edge;
use crate::error::GraphError;
use crate::job::Job;
use crate::trigger::Trigger;
use amber_relay_core::{JobId, TriggerId};
use petgraph::graph::DiGraph;
use std::collections::{HashMap, HashSet};

/// Returns the enabled edges leaving the given trigger, in stored order.
#[must_use]
pub fn outgoing_edges_from_trigger(edges: &[Edge], trigger_id: TriggerId) -> Vec<&Edge> {
    edges
        .iter()
        .filter(|edge| edge.enabled && edge.source.trigger_id() == Some(trigger_id))
        .collect()
}

/// Returns the enabled edges leaving the given job, in stored order.
#[must_use]
pub fn outgoing_edges_from_job(edges: &[Edge], job_id: JobId) -> Vec<&Edge> {
    edges
        .iter()
        .filter(|edge| edge.enabled && edge.source.job_id() == Some(job_id))
        .collect()
}

/// Returns every edge targeting the given job, from triggers and jobs alike.
#[must_use]
pub fn incoming_edges(edges: &[Edge], job_id: JobId) -> Vec<&Edge> {
    edges
        .iter()
        .filter(|edge| edge.target_job_id == Some(job_id))
        .collect()
}

/// Returns true if the job is an entry job: at least one incoming trigger
/// edge and no incoming job edge.
///
/// A job fed by both a trigger and another job is not an entry job; mixed
/// parents disqualify it as a start candidate.
#[must_use]
pub fn is_first_job(edges: &[Edge], job_id: JobId) -> bool {
    let incoming = incoming_edges(edges, job_id);
    let has_trigger_parent = incoming.iter().any(|edge| edge.source.is_trigger());
    let has_job_parent = incoming.iter().any(|edge| edge.source.is_job());
    has_trigger_parent && !has_job_parent
}

/// Partitions edges into (valid, ghost) by whether their target job exists.
///
/// An edge with no target at all is structurally incomplete, not dangling:
/// it lands in the valid partition. The two partitions are exact
/// complements of the input.
#[must_use]
pub fn partition_ghost_edges<'a>(edges: &'a [Edge], jobs: &[Job]) -> (Vec<&'a Edge>, Vec<&'a Edge>) {
    let job_ids: HashSet<JobId> = jobs.iter().map(|job| job.id).collect();
    edges.iter().partition(|edge| match edge.target_job_id {
        Some(target) => job_ids.contains(&target),
        None => true,
    })
}

/// Returns the edges whose target job no longer exists.
#[must_use]
pub fn find_ghost_edges<'a>(edges: &'a [Edge], jobs: &[Job]) -> Vec<&'a Edge> {
    partition_ghost_edges(edges, jobs).1
}

/// Returns the edges whose target job exists or is absent-by-design.
#[must_use]
pub fn remove_ghost_edges<'a>(edges: &'a [Edge], jobs: &[Job]) -> Vec<&'a Edge> {
    partition_ghost_edges(edges, jobs).0
}

/// What the caller wants to start an execution from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTarget {
    /// Start from this trigger's first connected job.
    Trigger(TriggerId),
    /// Start directly from this job, wherever it sits in the graph.
    Job(JobId),
}

/// A resolved start node: the job the first step will execute, and the
/// trigger it was reached through, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedStart {
    /// The job the execution chain begins at.
    pub job_id: JobId,
    /// The trigger that led there; `None` for a direct job start.
    pub trigger_id: Option<TriggerId>,
}

/// Resolves the start node for an execution.
///
/// A job target resolves to itself regardless of its position in the graph.
/// A trigger target resolves to the first job reached by the trigger's
/// enabled edges in stored order; ghost edges and edges without a target are
/// skipped, never traversed.
///
/// # Errors
///
/// Returns `JobNotFound`/`TriggerNotFound` when the target does not exist,
/// and `NoConnectedJob` when a trigger has no edge leading to an existing
/// job.
pub fn resolve_start_node(
    jobs: &[Job],
    triggers: &[Trigger],
    edges: &[Edge],
    target: StartTarget,
) -> Result<ResolvedStart, GraphError> {
    match target {
        StartTarget::Job(job_id) => {
            if !jobs.iter().any(|job| job.id == job_id) {
                return Err(GraphError::JobNotFound { job_id });
            }
            Ok(ResolvedStart {
                job_id,
                trigger_id: None,
            })
        }
        StartTarget::Trigger(trigger_id) => {
            if !triggers.iter().any(|trigger| trigger.id == trigger_id) {
                return Err(GraphError::TriggerNotFound { trigger_id });
            }
            let job_ids: HashSet<JobId> = jobs.iter().map(|job| job.id).collect();
            let first = outgoing_edges_from_trigger(edges, trigger_id)
                .into_iter()
                .find_map(|edge| edge.target_job_id.filter(|id| job_ids.contains(id)));

            match first {
                Some(job_id) => Ok(ResolvedStart {
                    job_id,
                    trigger_id: Some(trigger_id),
                }),
                None => Err(GraphError::NoConnectedJob { trigger_id }),
            }
        }
    }
}

/// Validates a workflow graph.
///
/// Checks:
/// - No duplicate job or trigger ids
/// - No ghost edges (targets must resolve)
/// - No cycles among jobs
///
/// # Errors
///
/// Returns the first validation failure found.
pub fn validate(jobs: &[Job], triggers: &[Trigger], edges: &[Edge]) -> Result<(), GraphError> {
    let mut seen: HashSet<String> = HashSet::new();
    for job in jobs {
        if !seen.insert(job.id.to_string()) {
            return Err(GraphError::DuplicateNodeId {
                id: job.id.to_string(),
            });
        }
    }
    for trigger in triggers {
        if !seen.insert(trigger.id.to_string()) {
            return Err(GraphError::DuplicateNodeId {
                id: trigger.id.to_string(),
            });
        }
    }

    if let Some(ghost) = find_ghost_edges(edges, jobs).first() {
        return Err(GraphError::GhostEdge {
            edge_id: ghost.id,
            target_job_id: ghost
                .target_job_id
                .expect("ghost edges always carry a target"),
        });
    }

    // Cycle check over job-to-job edges
    let mut graph: DiGraph<JobId, ()> = DiGraph::new();
    let mut index_of = HashMap::new();
    for job in jobs {
        let idx = graph.add_node(job.id);
        index_of.insert(job.id, idx);
    }
    for edge in edges {
        if let (Some(source), Some(target)) = (edge.source.job_id(), edge.target_job_id)
            && let (Some(&source_idx), Some(&target_idx)) =
                (index_of.get(&source), index_of.get(&target))
        {
            graph.add_edge(source_idx, target_idx, ());
        }
    }
    if petgraph::algo::is_cyclic_directed(&graph) {
        return Err(GraphError::CycleDetected);
    }

    Ok(())
}
