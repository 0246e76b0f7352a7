//! JSON client for the hosted inference endpoint.
//!
//! One shared client serves all three endpoint families: chat completions,
//! embeddings, and per-model image inference routes. Responses are decoded
//! into typed structs; non-2xx responses surface as `ModelRequest` errors
//! carrying the status and body detail.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use weft_core::config::ApiConfig;
use weft_core::error::{Result, WeftError};

pub struct EndpointClient {
    http: Client,
    base_url: String,
    api_key: String,
}

/// A chat message on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Sampling parameters for a chat completion.
#[derive(Debug, Clone, Serialize)]
pub struct ChatParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: Message,
}

#[derive(Debug, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

impl ChatResponse {
    /// Text of the first choice, if any.
    pub fn text(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<Embedding>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Embedding {
    pub index: usize,
    pub embedding: Vec<f32>,
}

/// Parameters for an image generation request.
#[derive(Debug, Clone, Serialize)]
pub struct ImageParams {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub num_images: u32,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            negative_prompt: String::new(),
            width: 1024,
            height: 1024,
            num_images: 1,
        }
    }
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
    #[serde(flatten)]
    params: &'a ImageParams,
}

/// Generated images as base64 payloads, passed through verbatim.
#[derive(Debug, Deserialize)]
pub struct ImageResponse {
    #[serde(default)]
    pub images: Vec<String>,
}

impl EndpointClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let api_key = config.resolve_key()?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("weft/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WeftError::ModelRequest(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        params: &ChatParams,
    ) -> Result<ChatResponse> {
        debug!(model, messages = messages.len(), "Sending chat completion request");
        let request = ChatRequest {
            model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        };
        self.post_json("chat/completions", &request).await
    }

    pub async fn embed(&self, model: &str, input: &[String]) -> Result<EmbeddingResponse> {
        debug!(model, inputs = input.len(), "Sending embedding request");
        self.post_json("embeddings", &EmbeddingRequest { model, input })
            .await
    }

    /// Image models are routed per model rather than through a shared path.
    pub async fn generate_image(
        &self,
        route: &str,
        prompt: &str,
        params: &ImageParams,
    ) -> Result<ImageResponse> {
        debug!(route, "Sending image generation request");
        self.post_json(route, &ImageRequest { prompt, params }).await
    }

    async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| WeftError::ModelRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(WeftError::ModelRequest(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                url,
                detail
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| WeftError::ModelParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_response_text() {
        let response: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        }))
        .unwrap();

        assert_eq!(response.text(), Some("hello"));
        assert_eq!(response.usage.unwrap().completion_tokens, 3);
    }

    #[test]
    fn test_chat_response_empty_choices() {
        let response: ChatResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(response.text().is_none());
    }

    #[test]
    fn test_embedding_response_parses() {
        let response: EmbeddingResponse = serde_json::from_value(serde_json::json!({
            "data": [
                {"index": 0, "embedding": [0.1, 0.2]},
                {"index": 1, "embedding": [0.3, 0.4]},
            ]
        }))
        .unwrap();

        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[1].embedding, vec![0.3, 0.4]);
    }

    #[test]
    fn test_image_request_omits_empty_negative_prompt() {
        let params = ImageParams::default();
        let json = serde_json::to_value(ImageRequest {
            prompt: "a sunset",
            params: &params,
        })
        .unwrap();

        assert_eq!(json["prompt"], "a sunset");
        assert_eq!(json["width"], 1024);
        assert!(json.get("negative_prompt").is_none());
    }
}
