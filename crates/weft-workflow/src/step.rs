use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use weft_core::types::RetryPolicy;

/// A single named unit of work in a workflow.
///
/// `retry` and `timeout_secs` are declared here but applied by the action
/// layer around each invocation; the runner itself never retries and never
/// enforces deadlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Unique name within the workflow.
    pub name: String,
    /// Name of the action to invoke, resolved by the action registry.
    pub action: String,
    /// Parameters passed to the action.
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    /// Steps whose outputs must be available before this one runs.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Retry policy for the action invocation.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Per-invocation timeout; the action's own default applies when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Step {
    /// Create a new step with minimal configuration.
    pub fn new(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: action.into(),
            parameters: HashMap::new(),
            depends_on: vec![],
            retry: RetryPolicy::default(),
            timeout_secs: None,
        }
    }

    /// Add a parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Set the dependency list.
    pub fn with_depends_on(mut self, deps: Vec<String>) -> Self {
        self.depends_on = deps;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the invocation timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}
