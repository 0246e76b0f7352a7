//! Actions backed by hosted models, resolved through the model registry.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use weft_core::config::ModelDefaults;
use weft_core::error::{Result, WeftError};
use weft_core::traits::Action;
use weft_core::types::{StepContext, StepOutcome};
use weft_models::{ChatParams, ImageParams, Message, ModelRegistry};

/// `chat` — send a prompt to a chat model and record the reply text.
pub struct ChatAction {
    models: Arc<ModelRegistry>,
    defaults: ModelDefaults,
}

#[derive(Deserialize)]
struct ChatInput {
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    system: Option<String>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    top_p: Option<f32>,
}

impl ChatAction {
    pub fn new(models: Arc<ModelRegistry>, defaults: ModelDefaults) -> Self {
        Self { models, defaults }
    }
}

impl Action for ChatAction {
    fn name(&self) -> &str {
        "chat"
    }

    fn description(&self) -> &str {
        "Send a prompt to a chat model and return the reply text"
    }

    fn invoke(
        &self,
        params: serde_json::Value,
        _context: StepContext,
    ) -> BoxFuture<'_, Result<StepOutcome>> {
        Box::pin(async move {
            let input: ChatInput = serde_json::from_value(params)
                .map_err(|e| WeftError::ActionInput(e.to_string()))?;

            let model_id = input.model.unwrap_or_else(|| self.defaults.chat.clone());
            let handle = self.models.handle(&model_id).await?;

            let mut messages = Vec::with_capacity(2);
            if let Some(system) = input.system {
                messages.push(Message::system(system));
            }
            messages.push(Message::user(input.prompt));

            let chat_params = ChatParams {
                max_tokens: input.max_tokens.unwrap_or(self.defaults.max_tokens),
                temperature: input.temperature.unwrap_or(self.defaults.temperature),
                top_p: input.top_p.unwrap_or(self.defaults.top_p),
            };

            debug!(model = %model_id, "Invoking chat model");
            let response = handle.chat(&messages, &chat_params).await?;

            let Some(text) = response.text().filter(|t| !t.trim().is_empty()) else {
                return Ok(StepOutcome::failure(format!(
                    "Model '{}' returned an empty response",
                    model_id
                )));
            };

            Ok(StepOutcome::success(serde_json::json!({
                "model": model_id,
                "text": text,
            })))
        })
    }
}

/// `embed` — embed one or more texts with a retrieval model.
pub struct EmbedAction {
    models: Arc<ModelRegistry>,
    defaults: ModelDefaults,
}

#[derive(Deserialize)]
struct EmbedInput {
    input: TextOrTexts,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrTexts {
    One(String),
    Many(Vec<String>),
}

impl From<TextOrTexts> for Vec<String> {
    fn from(value: TextOrTexts) -> Self {
        match value {
            TextOrTexts::One(s) => vec![s],
            TextOrTexts::Many(v) => v,
        }
    }
}

impl EmbedAction {
    pub fn new(models: Arc<ModelRegistry>, defaults: ModelDefaults) -> Self {
        Self { models, defaults }
    }
}

impl Action for EmbedAction {
    fn name(&self) -> &str {
        "embed"
    }

    fn description(&self) -> &str {
        "Embed one or more texts and return the vectors"
    }

    fn invoke(
        &self,
        params: serde_json::Value,
        _context: StepContext,
    ) -> BoxFuture<'_, Result<StepOutcome>> {
        Box::pin(async move {
            let input: EmbedInput = serde_json::from_value(params)
                .map_err(|e| WeftError::ActionInput(e.to_string()))?;

            let model_id = input
                .model
                .unwrap_or_else(|| self.defaults.embedding.clone());
            let texts: Vec<String> = input.input.into();
            if texts.is_empty() {
                return Ok(StepOutcome::failure("No input texts to embed"));
            }

            let handle = self.models.handle(&model_id).await?;

            debug!(model = %model_id, count = texts.len(), "Invoking embedding model");
            let response = handle.embed(&texts).await?;

            let embeddings: Vec<Vec<f32>> =
                response.data.into_iter().map(|d| d.embedding).collect();

            Ok(StepOutcome::success(serde_json::json!({
                "model": model_id,
                "count": embeddings.len(),
                "embeddings": embeddings,
            })))
        })
    }
}

/// `generate_image` — render a prompt with an image model.
pub struct GenerateImageAction {
    models: Arc<ModelRegistry>,
    defaults: ModelDefaults,
}

#[derive(Deserialize)]
struct GenerateImageInput {
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    negative_prompt: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    num_images: Option<u32>,
}

impl GenerateImageAction {
    pub fn new(models: Arc<ModelRegistry>, defaults: ModelDefaults) -> Self {
        Self { models, defaults }
    }
}

impl Action for GenerateImageAction {
    fn name(&self) -> &str {
        "generate_image"
    }

    fn description(&self) -> &str {
        "Generate images from a text prompt, returned as base64 payloads"
    }

    fn timeout_secs(&self) -> u64 {
        300
    }

    fn invoke(
        &self,
        params: serde_json::Value,
        _context: StepContext,
    ) -> BoxFuture<'_, Result<StepOutcome>> {
        Box::pin(async move {
            let input: GenerateImageInput = serde_json::from_value(params)
                .map_err(|e| WeftError::ActionInput(e.to_string()))?;

            let model_id = input.model.unwrap_or_else(|| self.defaults.image.clone());
            let handle = self.models.handle(&model_id).await?;

            let defaults = ImageParams::default();
            let image_params = ImageParams {
                negative_prompt: input.negative_prompt.unwrap_or_default(),
                width: input.width.unwrap_or(defaults.width),
                height: input.height.unwrap_or(defaults.height),
                num_images: input.num_images.unwrap_or(defaults.num_images),
            };

            debug!(model = %model_id, "Invoking image model");
            let response = handle.generate_image(&input.prompt, &image_params).await?;

            if response.images.is_empty() {
                return Ok(StepOutcome::failure(format!(
                    "Model '{}' returned no images",
                    model_id
                )));
            }

            Ok(StepOutcome::success(serde_json::json!({
                "model": model_id,
                "count": response.images.len(),
                "images": response.images,
            })))
        })
    }
}
