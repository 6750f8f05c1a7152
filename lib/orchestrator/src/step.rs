//! Steps: one job execution within a run.
//!
//! The external executor reports exit reasons as an open-ended string
//! vocabulary. Internally the engine works with the closed [`ExitReason`]
//! enum and a total mapping from arbitrary input, defaulting to the
//! strictest safe classification so an unexpected executor output can never
//! pass as success.

use amber_relay_core::{DataclipId, JobId, StepId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a step finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The job completed normally.
    Success,
    /// The job signalled a handled failure.
    Fail,
    /// The job blew up, was lost, or otherwise never finished cleanly.
    Crash,
}

impl ExitReason {
    /// Maps a raw executor exit string onto the closed enum.
    ///
    /// The mapping is total: unrecognized values classify as `Fail`.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        match raw {
            "success" => Self::Success,
            "crash" | "exception" | "lost" => Self::Crash,
            _ => Self::Fail,
        }
    }
}

/// Normalizes an optional raw exit reason.
///
/// `None` means the step is still running; it stays unclassified.
#[must_use]
pub fn normalize_exit_reason(raw: Option<&str>) -> Option<ExitReason> {
    raw.map(ExitReason::normalize)
}

/// Execution of one job within a run.
///
/// A step is created when the orchestrator hands the job off to the
/// executor; `started_at` is the dispatch time and orders steps within a
/// run (ties broken by insertion order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique identifier.
    pub id: StepId,
    /// The job this step executes.
    pub job_id: JobId,
    /// The input payload.
    pub input_dataclip_id: DataclipId,
    /// The output payload, once the executor reports one.
    pub output_dataclip_id: Option<DataclipId>,
    /// How the step finished. `None` while still running.
    pub exit_reason: Option<ExitReason>,
    /// Executor-supplied error classification, if any.
    pub error_type: Option<String>,
    /// When the step was handed to the executor.
    pub started_at: DateTime<Utc>,
    /// When the executor reported completion.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Step {
    /// Creates a new in-flight step.
    #[must_use]
    pub fn new(job_id: JobId, input_dataclip_id: DataclipId) -> Self {
        Self {
            id: StepId::new(),
            job_id,
            input_dataclip_id,
            output_dataclip_id: None,
            exit_reason: None,
            error_type: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Returns true if the executor has reported completion.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.exit_reason.is_some()
    }

    /// Records the executor's completion report.
    pub fn finish(
        &mut self,
        exit_reason: ExitReason,
        error_type: Option<String>,
        output_dataclip_id: Option<DataclipId>,
    ) {
        self.exit_reason = Some(exit_reason);
        self.error_type = error_type;
        self.output_dataclip_id = output_dataclip_id;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_table_holds() {
        assert_eq!(ExitReason::normalize("success"), ExitReason::Success);
        assert_eq!(ExitReason::normalize("crash"), ExitReason::Crash);
        assert_eq!(ExitReason::normalize("exception"), ExitReason::Crash);
        assert_eq!(ExitReason::normalize("lost"), ExitReason::Crash);
        assert_eq!(ExitReason::normalize("fail"), ExitReason::Fail);
        // Unknown strings classify as fail, never success
        assert_eq!(ExitReason::normalize("greatness"), ExitReason::Fail);
    }

    #[test]
    fn absent_exit_reason_stays_unclassified() {
        assert_eq!(normalize_exit_reason(None), None);
        assert_eq!(
            normalize_exit_reason(Some("success")),
            Some(ExitReason::Success)
        );
    }

    #[test]
    fn step_lifecycle() {
        let mut step = Step::new(JobId::new(), DataclipId::new());
        assert!(!step.is_finished());
        assert!(step.finished_at.is_none());

        let output = DataclipId::new();
        step.finish(ExitReason::Success, None, Some(output));
        assert!(step.is_finished());
        assert_eq!(step.exit_reason, Some(ExitReason::Success));
        assert_eq!(step.output_dataclip_id, Some(output));
        assert!(step.finished_at.is_some());
    }

    #[test]
    fn failed_step_records_error_type() {
        let mut step = Step::new(JobId::new(), DataclipId::new());
        step.finish(ExitReason::Crash, Some("TimeoutError".to_string()), None);
        assert_eq!(step.exit_reason, Some(ExitReason::Crash));
        assert_eq!(step.error_type.as_deref(), Some("TimeoutError"));
    }

    #[test]
    fn step_serde_roundtrip() {
        let step = Step::new(JobId::new(), DataclipId::new());
        let json = serde_json::to_string(&step).expect("serialize");
        let parsed: Step = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(step, parsed);
    }
}
