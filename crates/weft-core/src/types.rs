use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a workflow.
///
/// The runner drives `Pending -> Running -> {Completed | Failed | Cancelled}`.
/// `Paused` is declared for cooperative suspension but has no producing
/// transition yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Context assembled for one step invocation: the caller's initial context
/// overlaid with each dependency's recorded output, keyed by dependency name.
pub type StepContext = HashMap<String, serde_json::Value>;

/// Outcome of a single action invocation.
///
/// Either a structured payload (stored verbatim into the workflow results)
/// or a failure the action reported itself, distinct from a transport error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepOutcome {
    Success { output: serde_json::Value },
    Failure { error: String },
}

impl StepOutcome {
    pub fn success(output: serde_json::Value) -> Self {
        Self::Success { output }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Retry policy declared on a step.
///
/// The runner never retries; the action layer applies this around each
/// invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Workflow event broadcast to all subscribers.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// Workflow run started.
    RunStarted { workflow: String, total_steps: usize },
    /// A step's action invocation started.
    StepStarted {
        step: String,
        action: String,
        index: usize,
        total: usize,
    },
    /// A step completed and its output was recorded.
    StepCompleted { step: String, index: usize, total: usize },
    /// A step failed, halting the run.
    StepFailed { step: String, error: String },
    /// Workflow run completed successfully.
    RunCompleted { workflow: String, total_steps: usize },
    /// Workflow run failed.
    RunFailed { workflow: String, error: String },
    /// Workflow run was cancelled between steps.
    RunCancelled {
        workflow: String,
        steps_completed: usize,
    },
}
