//! Local utility actions for shaping step outputs between model calls.

use futures::future::BoxFuture;
use serde::Deserialize;

use weft_core::error::{Result, WeftError};
use weft_core::traits::Action;
use weft_core::types::{StepContext, StepOutcome};

/// `template` — render a string with `${...}` placeholders already resolved
/// against dependency outputs by the registry.
pub struct TemplateAction;

#[derive(Deserialize)]
struct TemplateInput {
    template: String,
}

impl Action for TemplateAction {
    fn name(&self) -> &str {
        "template"
    }

    fn description(&self) -> &str {
        "Render a text template against dependency outputs"
    }

    fn invoke(
        &self,
        params: serde_json::Value,
        _context: StepContext,
    ) -> BoxFuture<'_, Result<StepOutcome>> {
        Box::pin(async move {
            let input: TemplateInput = serde_json::from_value(params)
                .map_err(|e| WeftError::ActionInput(e.to_string()))?;

            Ok(StepOutcome::success(serde_json::json!({
                "text": input.template,
            })))
        })
    }
}

/// `extract` — pull a value out of a dependency's output by dotted path.
pub struct ExtractAction;

#[derive(Deserialize)]
struct ExtractInput {
    /// Context key to read, usually a dependency's step name.
    from: String,
    /// Dotted path inside that value; empty takes the value whole.
    #[serde(default)]
    path: String,
}

impl Action for ExtractAction {
    fn name(&self) -> &str {
        "extract"
    }

    fn description(&self) -> &str {
        "Extract a field from a dependency's output by dotted path"
    }

    fn invoke(
        &self,
        params: serde_json::Value,
        context: StepContext,
    ) -> BoxFuture<'_, Result<StepOutcome>> {
        Box::pin(async move {
            let input: ExtractInput = serde_json::from_value(params)
                .map_err(|e| WeftError::ActionInput(e.to_string()))?;

            let Some(root) = context.get(&input.from) else {
                return Ok(StepOutcome::failure(format!(
                    "No value named '{}' in step context",
                    input.from
                )));
            };

            let mut current = root;
            if !input.path.is_empty() {
                for segment in input.path.split('.') {
                    let next = match current {
                        serde_json::Value::Object(map) => map.get(segment),
                        serde_json::Value::Array(items) => segment
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| items.get(i)),
                        _ => None,
                    };
                    match next {
                        Some(value) => current = value,
                        None => {
                            return Ok(StepOutcome::failure(format!(
                                "Path '{}' not found in '{}'",
                                input.path, input.from
                            )));
                        }
                    }
                }
            }

            Ok(StepOutcome::success(current.clone()))
        })
    }
}
