//! Workflow execution: dependency-ordered, sequential, halt-on-first-failure.

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use weft_core::error::{Result, WeftError};
use weft_core::event::EventBus;
use weft_core::types::{StepContext, StepOutcome, WorkflowEvent, WorkflowStatus};

use crate::graph::DependencyGraph;
use crate::result::WorkflowResult;
use crate::step::Step;
use crate::workflow::Workflow;

/// Collaborator that resolves a step's action and executes it.
///
/// The call is the runner's only suspension point; it may take arbitrarily
/// long (remote model invocation) and may fail either by returning an error
/// or by reporting a [`StepOutcome::Failure`].
pub trait ActionInvoker: Send + Sync + 'static {
    fn invoke_step<'a>(
        &'a self,
        step: &'a Step,
        context: StepContext,
    ) -> BoxFuture<'a, Result<StepOutcome>>;
}

/// Executes a workflow's steps in dependency order, accumulating each step's
/// output into the context of its dependents.
///
/// `run` never returns an error: every failure mode is folded into a
/// [`WorkflowResult`] so callers branch on `result.status` instead of
/// handling errors. `run` takes the workflow by exclusive borrow, so one
/// run is active per workflow instance at a time.
pub struct WorkflowRunner {
    invoker: Arc<dyn ActionInvoker>,
    events: Arc<EventBus>,
    cancel: Option<CancellationToken>,
}

impl WorkflowRunner {
    pub fn new(invoker: Arc<dyn ActionInvoker>) -> Self {
        Self {
            invoker,
            events: Arc::new(EventBus::default()),
            cancel: None,
        }
    }

    /// Publish progress events on the given bus.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Observe a cancellation token at step boundaries.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Execute the workflow.
    ///
    /// Resets `workflow.results` and `workflow.status` first, so every run
    /// starts from a clean slate and a workflow instance can be re-run.
    pub async fn run(&self, workflow: &mut Workflow, initial_context: StepContext) -> WorkflowResult {
        workflow.status = WorkflowStatus::Running;
        workflow.results.clear();

        let total = workflow.len();
        let start = Instant::now();

        info!(workflow = %workflow.name, total_steps = total, "Starting workflow run");
        self.events.publish(WorkflowEvent::RunStarted {
            workflow: workflow.name.clone(),
            total_steps: total,
        });

        // Validate structure before anything executes
        let order = match self.resolve_order(workflow) {
            Ok(order) => order,
            Err(e) => {
                return self.fail(workflow, e.to_string(), start, 0, total);
            }
        };

        for (i, step_name) in order.iter().enumerate() {
            let completed = i; // steps finished before this one

            if let Some(token) = &self.cancel {
                if token.is_cancelled() {
                    workflow.status = WorkflowStatus::Cancelled;
                    let message = format!(
                        "Workflow '{}' cancelled after {} of {} steps",
                        workflow.name, completed, total
                    );
                    warn!(workflow = %workflow.name, steps_completed = completed, "Workflow cancelled");
                    self.events.publish(WorkflowEvent::RunCancelled {
                        workflow: workflow.name.clone(),
                        steps_completed: completed,
                    });
                    return WorkflowResult::failed(message, start.elapsed(), completed, total);
                }
            }

            // The order came from this workflow, so the lookup cannot miss;
            // treated as a halting failure rather than a panic to keep `run` total.
            let Some(step) = workflow.get(step_name).cloned() else {
                let message = format!("Step '{}' vanished from workflow during run", step_name);
                return self.fail(workflow, message, start, completed, total);
            };

            // Topological order already guarantees this; recheck as a safety
            // net against ordering bugs.
            let missing: Vec<String> = step
                .depends_on
                .iter()
                .filter(|dep| !workflow.results.contains_key(*dep))
                .cloned()
                .collect();
            if !missing.is_empty() {
                let e = WeftError::UnmetDependency {
                    step: step.name.clone(),
                    missing,
                };
                return self.fail(workflow, e.to_string(), start, completed, total);
            }

            // Per-step context: caller's context overlaid with each
            // dependency's recorded output, keyed by dependency name.
            let mut step_context = initial_context.clone();
            for dep in &step.depends_on {
                if let Some(result) = workflow.results.get(dep) {
                    step_context.insert(dep.clone(), result.clone());
                }
            }

            info!(
                workflow = %workflow.name,
                step = %step.name,
                action = %step.action,
                progress = format!("{}/{}", i + 1, total),
                "Executing workflow step"
            );
            self.events.publish(WorkflowEvent::StepStarted {
                step: step.name.clone(),
                action: step.action.clone(),
                index: i + 1,
                total,
            });

            match self.invoker.invoke_step(&step, step_context).await {
                Ok(StepOutcome::Success { output }) => {
                    workflow.results.insert(step.name.clone(), output);
                    self.events.publish(WorkflowEvent::StepCompleted {
                        step: step.name.clone(),
                        index: i + 1,
                        total,
                    });
                }
                Ok(StepOutcome::Failure { error: reason }) => {
                    let message = format!("Step '{}' failed: {}", step.name, reason);
                    self.events.publish(WorkflowEvent::StepFailed {
                        step: step.name.clone(),
                        error: reason,
                    });
                    return self.fail(workflow, message, start, completed, total);
                }
                Err(e) => {
                    let message = format!("Error executing step '{}': {}", step.name, e);
                    self.events.publish(WorkflowEvent::StepFailed {
                        step: step.name.clone(),
                        error: e.to_string(),
                    });
                    return self.fail(workflow, message, start, completed, total);
                }
            }
        }

        workflow.status = WorkflowStatus::Completed;
        info!(
            workflow = %workflow.name,
            total_steps = total,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Workflow completed"
        );
        self.events.publish(WorkflowEvent::RunCompleted {
            workflow: workflow.name.clone(),
            total_steps: total,
        });

        WorkflowResult::completed(workflow.results.clone(), start.elapsed(), total)
    }

    /// Validate the dependency graph and compute the execution order.
    fn resolve_order(&self, workflow: &Workflow) -> Result<Vec<String>> {
        let graph = DependencyGraph::build(workflow)?;
        graph.validate()?;
        graph.topological_order()
    }

    fn fail(
        &self,
        workflow: &mut Workflow,
        message: String,
        start: Instant,
        steps_completed: usize,
        total_steps: usize,
    ) -> WorkflowResult {
        workflow.status = WorkflowStatus::Failed;
        error!(workflow = %workflow.name, error = %message, "Workflow failed");
        self.events.publish(WorkflowEvent::RunFailed {
            workflow: workflow.name.clone(),
            error: message.clone(),
        });
        WorkflowResult::failed(message, start.elapsed(), steps_completed, total_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted invoker: maps step name -> canned outcome and records every
    /// invocation with the context it received.
    struct ScriptedInvoker {
        outcomes: HashMap<String, Scripted>,
        calls: Mutex<Vec<(String, StepContext)>>,
    }

    #[derive(Clone)]
    enum Scripted {
        Succeed(serde_json::Value),
        Report(String),
        Raise(String),
    }

    impl ScriptedInvoker {
        fn new(outcomes: Vec<(&str, Scripted)>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: outcomes
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn invoked_steps(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
        }

        fn context_for(&self, step: &str) -> Option<StepContext> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .find(|(s, _)| s == step)
                .map(|(_, ctx)| ctx.clone())
        }
    }

    impl ActionInvoker for ScriptedInvoker {
        fn invoke_step<'a>(
            &'a self,
            step: &'a Step,
            context: StepContext,
        ) -> BoxFuture<'a, Result<StepOutcome>> {
            self.calls
                .lock()
                .unwrap()
                .push((step.name.clone(), context));

            let scripted = self
                .outcomes
                .get(&step.name)
                .cloned()
                .unwrap_or(Scripted::Succeed(serde_json::json!({"status": "ok"})));

            Box::pin(async move {
                match scripted {
                    Scripted::Succeed(value) => Ok(StepOutcome::success(value)),
                    Scripted::Report(reason) => Ok(StepOutcome::failure(reason)),
                    Scripted::Raise(message) => Err(WeftError::ActionFailed {
                        action: step.action.clone(),
                        message,
                    }),
                }
            })
        }
    }

    fn step(name: &str, deps: &[&str]) -> Step {
        Step::new(name, "noop").with_depends_on(deps.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_full_success_collects_all_outputs() {
        let invoker = ScriptedInvoker::new(vec![
            ("a", Scripted::Succeed(serde_json::json!(1))),
            ("b", Scripted::Succeed(serde_json::json!(2))),
            ("c", Scripted::Succeed(serde_json::json!(3))),
        ]);
        let runner = WorkflowRunner::new(invoker.clone());

        let mut wf = Workflow::new(
            "independent",
            vec![step("a", &[]), step("b", &[]), step("c", &[])],
        )
        .unwrap();

        let result = runner.run(&mut wf, StepContext::new()).await;

        assert_eq!(result.status, WorkflowStatus::Completed);
        assert_eq!(result.steps_completed, 3);
        assert_eq!(result.total_steps, 3);
        let output = result.output.unwrap();
        assert_eq!(output["a"], serde_json::json!(1));
        assert_eq!(output["b"], serde_json::json!(2));
        assert_eq!(output["c"], serde_json::json!(3));
        assert_eq!(wf.status, WorkflowStatus::Completed);
    }

    #[tokio::test]
    async fn test_dependency_output_flows_into_context() {
        let invoker = ScriptedInvoker::new(vec![(
            "a",
            Scripted::Succeed(serde_json::json!({"x": 1})),
        )]);
        let runner = WorkflowRunner::new(invoker.clone());

        let mut wf =
            Workflow::new("chain", vec![step("a", &[]), step("b", &["a"])]).unwrap();

        let mut initial = StepContext::new();
        initial.insert("query".into(), serde_json::json!("rust"));

        let result = runner.run(&mut wf, initial).await;
        assert!(result.is_success());

        let ctx = invoker.context_for("b").unwrap();
        assert_eq!(ctx["a"], serde_json::json!({"x": 1}));
        assert_eq!(ctx["query"], serde_json::json!("rust"));

        // a ran before its output existed, so it saw only the initial context
        let ctx_a = invoker.context_for("a").unwrap();
        assert!(!ctx_a.contains_key("a"));
        assert_eq!(ctx_a["query"], serde_json::json!("rust"));
    }

    #[tokio::test]
    async fn test_halts_on_first_raised_error() {
        let invoker = ScriptedInvoker::new(vec![("b", Scripted::Raise("boom".into()))]);
        let runner = WorkflowRunner::new(invoker.clone());

        let mut wf = Workflow::new(
            "chain",
            vec![step("a", &[]), step("b", &["a"]), step("c", &["b"])],
        )
        .unwrap();

        let result = runner.run(&mut wf, StepContext::new()).await;

        assert_eq!(result.status, WorkflowStatus::Failed);
        assert_eq!(result.steps_completed, 1);
        assert_eq!(result.total_steps, 3);
        let error = result.error.unwrap();
        assert!(error.contains("Error executing step 'b'"), "got: {error}");
        assert_eq!(invoker.invoked_steps(), vec!["a", "b"]);
        assert_eq!(wf.status, WorkflowStatus::Failed);
    }

    #[tokio::test]
    async fn test_halts_on_action_reported_failure() {
        let invoker =
            ScriptedInvoker::new(vec![("b", Scripted::Report("rate limited".into()))]);
        let runner = WorkflowRunner::new(invoker.clone());

        let mut wf = Workflow::new(
            "chain",
            vec![step("a", &[]), step("b", &["a"]), step("c", &["b"])],
        )
        .unwrap();

        let result = runner.run(&mut wf, StepContext::new()).await;

        assert_eq!(result.steps_completed, 1);
        let error = result.error.unwrap();
        assert!(error.contains("Step 'b' failed: rate limited"), "got: {error}");
        assert_eq!(invoker.invoked_steps(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_cycle_fails_before_any_invocation() {
        let invoker = ScriptedInvoker::new(vec![]);
        let runner = WorkflowRunner::new(invoker.clone());

        let mut wf =
            Workflow::new("cyclic", vec![step("a", &["b"]), step("b", &["a"])]).unwrap();

        let result = runner.run(&mut wf, StepContext::new()).await;

        assert_eq!(result.status, WorkflowStatus::Failed);
        assert_eq!(result.steps_completed, 0);
        assert_eq!(result.total_steps, 2);
        assert!(result.error.unwrap().contains("Circular dependency"));
        assert!(invoker.invoked_steps().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_dependency_fails_before_any_invocation() {
        let invoker = ScriptedInvoker::new(vec![]);
        let runner = WorkflowRunner::new(invoker.clone());

        let mut wf = Workflow::new("broken", vec![step("a", &["ghost"])]).unwrap();

        let result = runner.run(&mut wf, StepContext::new()).await;

        assert_eq!(result.status, WorkflowStatus::Failed);
        assert_eq!(result.steps_completed, 0);
        let error = result.error.unwrap();
        assert!(error.contains("unknown step 'ghost'"), "got: {error}");
        assert!(invoker.invoked_steps().is_empty());
    }

    #[tokio::test]
    async fn test_rerun_starts_from_clean_results() {
        let invoker = ScriptedInvoker::new(vec![(
            "a",
            Scripted::Succeed(serde_json::json!("fresh")),
        )]);
        let runner = WorkflowRunner::new(invoker.clone());

        let mut wf = Workflow::new("single", vec![step("a", &[])]).unwrap();
        // Simulate stale state from a previous run
        wf.results.insert("stale".into(), serde_json::json!("old"));
        wf.status = WorkflowStatus::Failed;

        let result = runner.run(&mut wf, StepContext::new()).await;

        assert!(result.is_success());
        let output = result.output.unwrap();
        assert!(!output.contains_key("stale"));
        assert_eq!(output["a"], serde_json::json!("fresh"));

        // And a second run over the same instance behaves identically
        let again = runner.run(&mut wf, StepContext::new()).await;
        assert!(again.is_success());
        assert_eq!(again.steps_completed, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_invokes_nothing() {
        let invoker = ScriptedInvoker::new(vec![]);
        let token = CancellationToken::new();
        token.cancel();

        let runner = WorkflowRunner::new(invoker.clone()).with_cancellation(token);

        let mut wf = Workflow::new("cancellable", vec![step("a", &[])]).unwrap();
        let result = runner.run(&mut wf, StepContext::new()).await;

        assert_eq!(result.status, WorkflowStatus::Failed);
        assert!(result.error.unwrap().contains("cancelled"));
        assert_eq!(wf.status, WorkflowStatus::Cancelled);
        assert!(invoker.invoked_steps().is_empty());
    }

    #[tokio::test]
    async fn test_empty_workflow_completes() {
        let invoker = ScriptedInvoker::new(vec![]);
        let runner = WorkflowRunner::new(invoker);

        let mut wf = Workflow::new("empty", vec![]).unwrap();
        let result = runner.run(&mut wf, StepContext::new()).await;

        assert!(result.is_success());
        assert_eq!(result.total_steps, 0);
        assert!(result.output.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_three_stage_pipeline_end_to_end() {
        let invoker = ScriptedInvoker::new(vec![
            ("fetch", Scripted::Succeed(serde_json::json!({"docs": [1, 2]}))),
            (
                "summarize",
                Scripted::Succeed(serde_json::json!({"summary": "ok"})),
            ),
            (
                "format",
                Scripted::Succeed(serde_json::json!({"text": "Summary: ok"})),
            ),
        ]);
        let runner = WorkflowRunner::new(invoker.clone());

        let mut wf = Workflow::new(
            "demo",
            vec![
                step("fetch", &[]),
                step("summarize", &["fetch"]),
                step("format", &["summarize"]),
            ],
        )
        .unwrap();

        let result = runner.run(&mut wf, StepContext::new()).await;

        assert_eq!(result.status, WorkflowStatus::Completed);
        assert_eq!(result.steps_completed, 3);
        assert_eq!(result.total_steps, 3);

        let output = result.output.unwrap();
        assert_eq!(output["fetch"], serde_json::json!({"docs": [1, 2]}));
        assert_eq!(output["format"], serde_json::json!({"text": "Summary: ok"}));

        // summarize saw fetch's output, format saw summarize's
        let ctx = invoker.context_for("summarize").unwrap();
        assert_eq!(ctx["fetch"], serde_json::json!({"docs": [1, 2]}));
        let ctx = invoker.context_for("format").unwrap();
        assert_eq!(ctx["summarize"], serde_json::json!({"summary": "ok"}));
        assert!(!ctx.contains_key("fetch"));
    }

    #[tokio::test]
    async fn test_events_published_in_order() {
        let invoker = ScriptedInvoker::new(vec![]);
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();

        let runner = WorkflowRunner::new(invoker).with_events(events);
        let mut wf = Workflow::new("evented", vec![step("a", &[])]).unwrap();
        let result = runner.run(&mut wf, StepContext::new()).await;
        assert!(result.is_success());

        assert!(matches!(rx.try_recv().unwrap(), WorkflowEvent::RunStarted { .. }));
        assert!(matches!(rx.try_recv().unwrap(), WorkflowEvent::StepStarted { .. }));
        assert!(matches!(
            rx.try_recv().unwrap(),
            WorkflowEvent::StepCompleted { .. }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            WorkflowEvent::RunCompleted { .. }
        ));
    }
}
