//! Action registry: resolves a step's action by name and executes it under
//! the step's declared resilience policy.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use weft_core::error::{Result, WeftError};
use weft_core::traits::Action;
use weft_core::types::{StepContext, StepOutcome};
use weft_workflow::runner::ActionInvoker;
use weft_workflow::step::Step;

use crate::template::interpolate;

/// Registry of available actions.
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register an action.
    pub fn register(&mut self, action: impl Action) {
        let name = action.name().to_string();
        self.actions.insert(name, Arc::new(action));
    }

    /// Get an action by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    /// List registered action names.
    pub fn list(&self) -> Vec<&str> {
        self.actions.keys().map(|s| s.as_str()).collect()
    }

    /// Resolve and execute a step's action.
    ///
    /// The step's parameters are resolved against the context first, then the
    /// call runs under the step's timeout and retry policy. Only transient
    /// transport errors and timeouts are retried; an outcome the action
    /// itself reports (including `Failure`) is returned as-is.
    pub async fn invoke(&self, step: &Step, context: StepContext) -> Result<StepOutcome> {
        let action = self
            .get(&step.action)
            .ok_or_else(|| WeftError::ActionNotFound(step.action.clone()))?;

        let params = interpolate(
            &serde_json::Value::Object(step.parameters.clone().into_iter().collect()),
            &context,
        );

        let timeout_secs = step.timeout_secs.unwrap_or_else(|| action.timeout_secs());
        let timeout = Duration::from_secs(timeout_secs);
        let max_retries = step.retry.max_retries;

        let mut last_err = None;
        for attempt in 0..=max_retries {
            let call = action.invoke(params.clone(), context.clone());
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(WeftError::ActionTimeout {
                    action: step.action.clone(),
                    timeout_secs,
                }),
            };

            match result {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    if is_retryable(&e) && attempt < max_retries {
                        let backoff = calculate_backoff(attempt, &step.retry);
                        warn!(
                            step = %step.name,
                            action = %step.action,
                            attempt = attempt + 1,
                            max_retries,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %e,
                            "Retrying action invocation"
                        );
                        tokio::time::sleep(backoff).await;
                        last_err = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| WeftError::ActionFailed {
            action: step.action.clone(),
            message: "retries exhausted".into(),
        }))
    }

    /// Create a registry with all built-in actions registered against the
    /// given model registry.
    pub fn with_builtins(
        models: Arc<weft_models::ModelRegistry>,
        defaults: weft_core::config::ModelDefaults,
    ) -> Self {
        let mut registry = Self::new();

        registry.register(crate::model::ChatAction::new(models.clone(), defaults.clone()));
        registry.register(crate::model::EmbedAction::new(models.clone(), defaults.clone()));
        registry.register(crate::model::GenerateImageAction::new(models, defaults));

        registry.register(crate::builtin::TemplateAction);
        registry.register(crate::builtin::ExtractAction);

        registry
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionInvoker for ActionRegistry {
    fn invoke_step<'a>(
        &'a self,
        step: &'a Step,
        context: StepContext,
    ) -> BoxFuture<'a, Result<StepOutcome>> {
        debug!(step = %step.name, action = %step.action, "Resolving step action");
        Box::pin(self.invoke(step, context))
    }
}

fn is_retryable(e: &WeftError) -> bool {
    match e {
        WeftError::ModelRequest(msg) => {
            msg.contains("429")
                || msg.contains("500")
                || msg.contains("502")
                || msg.contains("503")
                || msg.contains("timeout")
                || msg.contains("connection")
        }
        WeftError::ActionTimeout { .. } => true,
        _ => false,
    }
}

fn calculate_backoff(attempt: u32, policy: &weft_core::types::RetryPolicy) -> Duration {
    let ms = (policy.initial_backoff_ms * 2u64.pow(attempt)).min(policy.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}
