use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{StepContext, StepOutcome};

/// Action — a named operation a workflow step can invoke.
///
/// Implementations wrap either a hosted model call or a local utility.
/// `params` are the step's declared parameters (already interpolated against
/// the step context); `context` carries the initial run context plus each
/// dependency's output keyed by step name.
pub trait Action: Send + Sync + 'static {
    /// Action name (referenced by `Step::action`).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Invoke the action.
    fn invoke(
        &self,
        params: serde_json::Value,
        context: StepContext,
    ) -> BoxFuture<'_, Result<StepOutcome>>;

    /// Default timeout in seconds, used when the step declares none.
    fn timeout_secs(&self) -> u64 {
        120
    }
}
