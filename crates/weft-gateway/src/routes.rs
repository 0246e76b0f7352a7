use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use weft_core::types::StepContext;
use weft_workflow::{Workflow, WorkflowDef, WorkflowRunner};

use crate::state::AppState;

// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// GET /api/models
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let models: Vec<serde_json::Value> = state
        .models
        .list()
        .iter()
        .map(|spec| {
            serde_json::json!({
                "id": spec.id,
                "kind": spec.kind,
                "description": spec.description,
            })
        })
        .collect();

    Json(serde_json::json!({ "models": models }))
}

#[derive(Deserialize)]
pub struct RunWorkflowBody {
    #[serde(flatten)]
    pub workflow: WorkflowDef,
    #[serde(default)]
    pub context: StepContext,
}

// POST /api/workflows/run
//
// The runner folds execution failures into the result body; only a
// malformed definition (e.g. duplicate step names) is an HTTP error.
pub async fn run_workflow(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunWorkflowBody>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let mut workflow = Workflow::try_from(body.workflow).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
    })?;

    info!(workflow = %workflow.name, steps = workflow.len(), "Gateway workflow run requested");

    let runner = WorkflowRunner::new(state.actions.clone()).with_events(state.events.clone());
    let result = runner.run(&mut workflow, body.context).await;

    let body = serde_json::to_value(&result).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
    })?;

    Ok(Json(body))
}
