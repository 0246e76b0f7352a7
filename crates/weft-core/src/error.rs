use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeftError {
    // Workflow structure errors
    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("Circular dependency detected in workflow: {}", .steps.join(" -> "))]
    CircularDependency { steps: Vec<String> },

    #[error("Duplicate step name in workflow: {0}")]
    DuplicateStep(String),

    #[error("Dependencies not satisfied for step '{step}': {}", .missing.join(", "))]
    UnmetDependency { step: String, missing: Vec<String> },

    // Action errors
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Action '{action}' failed: {message}")]
    ActionFailed { action: String, message: String },

    #[error("Action '{action}' timed out after {timeout_secs}s")]
    ActionTimeout { action: String, timeout_secs: u64 },

    #[error("Invalid action input: {0}")]
    ActionInput(String),

    // Model errors
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model '{model}' does not support {operation}")]
    ModelKindMismatch { model: String, operation: String },

    #[error("Model request failed: {0}")]
    ModelRequest(String),

    #[error("Model response parse error: {0}")]
    ModelParse(String),

    // Run control
    #[error("Workflow cancelled")]
    Cancelled,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Gateway errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WeftError>;
