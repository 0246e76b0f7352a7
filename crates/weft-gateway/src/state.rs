use std::sync::Arc;

use weft_actions::ActionRegistry;
use weft_core::event::EventBus;
use weft_models::ModelRegistry;

/// Shared application state for axum handlers.
pub struct AppState {
    pub models: Arc<ModelRegistry>,
    pub actions: Arc<ActionRegistry>,
    pub events: Arc<EventBus>,
}
