use std::io::Write;
use std::sync::Arc;

use weft_actions::ActionRegistry;
use weft_core::config::{ApiConfig, ModelDefaults};
use weft_core::types::{StepContext, WorkflowStatus};
use weft_models::ModelRegistry;
use weft_workflow::{Workflow, WorkflowDef, WorkflowRunner};

fn builtin_actions() -> Arc<ActionRegistry> {
    // Local actions only; no credentials are needed unless a model action runs
    let models = Arc::new(ModelRegistry::with_defaults(ApiConfig::default()));
    Arc::new(ActionRegistry::with_builtins(models, ModelDefaults::default()))
}

#[test]
fn test_load_workflow_from_toml_file() {
    let toml_content = r#"
name = "rag-pipeline"

[[step]]
name = "retrieve"
action = "embed"
parameters = { input = "${query}" }

[[step]]
name = "generate"
action = "chat"
depends_on = ["retrieve"]
timeout_secs = 60
parameters = { prompt = "Answer using ${retrieve}" }

[[step]]
name = "format"
action = "template"
depends_on = ["generate"]
parameters = { template = "Answer: ${generate}" }
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(toml_content.as_bytes()).unwrap();

    let content = std::fs::read_to_string(file.path()).unwrap();
    let def: WorkflowDef = toml::from_str(&content).unwrap();
    let workflow = Workflow::try_from(def).unwrap();

    assert_eq!(workflow.name, "rag-pipeline");
    assert_eq!(workflow.len(), 3);

    let generate = workflow.get("generate").unwrap();
    assert_eq!(generate.depends_on, vec!["retrieve"]);
    assert_eq!(generate.timeout_secs, Some(60));
    assert_eq!(generate.retry.max_retries, 3);
}

#[tokio::test]
async fn test_offline_pipeline_through_builtin_actions() {
    let def: WorkflowDef = toml::from_str(
        r#"
name = "offline-demo"

[[step]]
name = "fetch"
action = "template"
parameters = { template = "two documents about ${query}" }

[[step]]
name = "summarize"
action = "extract"
depends_on = ["fetch"]
parameters = { from = "fetch", path = "text" }

[[step]]
name = "format"
action = "template"
depends_on = ["summarize"]
parameters = { template = "Summary: ${summarize}" }
"#,
    )
    .unwrap();

    let mut workflow = Workflow::try_from(def).unwrap();
    let runner = WorkflowRunner::new(builtin_actions());

    let mut initial = StepContext::new();
    initial.insert("query".into(), serde_json::json!("rust"));

    let result = runner.run(&mut workflow, initial).await;

    assert_eq!(result.status, WorkflowStatus::Completed);
    assert_eq!(result.steps_completed, 3);

    let output = result.output.unwrap();
    assert_eq!(
        output["fetch"]["text"],
        serde_json::json!("two documents about rust")
    );
    assert_eq!(output["summarize"], serde_json::json!("two documents about rust"));
    assert_eq!(
        output["format"]["text"],
        serde_json::json!("Summary: two documents about rust")
    );
}

#[tokio::test]
async fn test_structural_errors_surface_in_result() {
    let def: WorkflowDef = toml::from_str(
        r#"
name = "tangled"

[[step]]
name = "a"
action = "template"
depends_on = ["b"]
parameters = { template = "x" }

[[step]]
name = "b"
action = "template"
depends_on = ["a"]
parameters = { template = "y" }
"#,
    )
    .unwrap();

    let mut workflow = Workflow::try_from(def).unwrap();
    let runner = WorkflowRunner::new(builtin_actions());
    let result = runner.run(&mut workflow, StepContext::new()).await;

    assert_eq!(result.status, WorkflowStatus::Failed);
    assert_eq!(result.steps_completed, 0);
    assert!(result.error.unwrap().contains("Circular dependency"));
}

#[test]
fn test_duplicate_step_names_rejected_at_load() {
    let def: WorkflowDef = toml::from_str(
        r#"
name = "dupes"

[[step]]
name = "a"
action = "template"

[[step]]
name = "a"
action = "template"
"#,
    )
    .unwrap();

    assert!(Workflow::try_from(def).is_err());
}
