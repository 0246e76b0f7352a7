use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use weft_core::types::WorkflowStatus;

/// Outcome record for one workflow run.
///
/// Always returned by the runner, never raised past it: callers branch on
/// `status`. `output` is present only on success; `error` only on failure.
/// The counters let a caller render "N of M steps completed" either way.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub status: WorkflowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<HashMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Elapsed wall-clock time, serialized as fractional seconds.
    #[serde(serialize_with = "as_secs_f64", rename = "execution_time_secs")]
    pub execution_time: Duration,
    pub steps_completed: usize,
    pub total_steps: usize,
}

fn as_secs_f64<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl WorkflowResult {
    pub fn completed(
        output: HashMap<String, serde_json::Value>,
        execution_time: Duration,
        total_steps: usize,
    ) -> Self {
        Self {
            status: WorkflowStatus::Completed,
            output: Some(output),
            error: None,
            execution_time,
            steps_completed: total_steps,
            total_steps,
        }
    }

    pub fn failed(
        error: impl Into<String>,
        execution_time: Duration,
        steps_completed: usize,
        total_steps: usize,
    ) -> Self {
        Self {
            status: WorkflowStatus::Failed,
            output: None,
            error: Some(error.into()),
            execution_time,
            steps_completed,
            total_steps,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }
}
