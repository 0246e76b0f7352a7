//! Model registry with lazy endpoint resolution.
//!
//! Specs are plain catalog data; nothing touches the network or requires an
//! API key until a handle is requested, at which point the shared
//! [`EndpointClient`] is built once and reused.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use weft_core::config::ApiConfig;
use weft_core::error::{Result, WeftError};

use crate::client::{
    ChatParams, ChatResponse, EmbeddingResponse, EndpointClient, ImageParams, ImageResponse,
    Message,
};

/// Task family a model serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Chat,
    Embedding,
    Image,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Chat => "chat",
            Self::Embedding => "embedding",
            Self::Image => "image",
        };
        write!(f, "{}", s)
    }
}

/// Catalog entry for one hosted model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSpec {
    /// Public id used in config, CLI flags, and step parameters.
    pub id: String,
    /// Model name as the upstream endpoint knows it.
    pub upstream: String,
    pub kind: ModelKind,
    pub description: String,
    /// Endpoint route for image models (chat/embedding share fixed routes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

impl ModelSpec {
    pub fn new(
        id: impl Into<String>,
        upstream: impl Into<String>,
        kind: ModelKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            upstream: upstream.into(),
            kind,
            description: description.into(),
            route: None,
        }
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }
}

/// Registry of available models.
///
/// Explicitly constructed and passed by reference to whatever needs lookup;
/// there is no process-wide instance.
pub struct ModelRegistry {
    api: ApiConfig,
    specs: HashMap<String, ModelSpec>,
    order: Vec<String>,
    client: tokio::sync::OnceCell<Arc<EndpointClient>>,
}

impl ModelRegistry {
    pub fn new(api: ApiConfig) -> Self {
        Self {
            api,
            specs: HashMap::new(),
            order: Vec::new(),
            client: tokio::sync::OnceCell::new(),
        }
    }

    /// Create a registry pre-populated with the built-in catalog.
    pub fn with_defaults(api: ApiConfig) -> Self {
        let mut registry = Self::new(api);

        // ── Chat ────────────────────────────────────────────────
        registry.register(ModelSpec::new(
            "dbrx-instruct",
            "databricks/dbrx-instruct",
            ModelKind::Chat,
            "Databricks DBRX Instruct for general purpose chat",
        ));
        registry.register(ModelSpec::new(
            "codegemma-7b",
            "google/codegemma-7b",
            ModelKind::Chat,
            "Google's CodeGemma 7B for code generation",
        ));
        registry.register(ModelSpec::new(
            "gemma-2-7b",
            "google/gemma-2-7b-it",
            ModelKind::Chat,
            "Google's Gemma 2 7B for general purpose chat",
        ));
        registry.register(ModelSpec::new(
            "starcoder2-15b",
            "bigcode/starcoder2-15b",
            ModelKind::Chat,
            "BigCode StarCoder2 15B for code completion",
        ));

        // ── Embedding ───────────────────────────────────────────
        registry.register(ModelSpec::new(
            "nv-embed-v1",
            "nvidia/nv-embed-v1",
            ModelKind::Embedding,
            "General-purpose text embedding model",
        ));
        registry.register(ModelSpec::new(
            "nv-embedcode-7b",
            "nvidia/nv-embedcode-7b-v1",
            ModelKind::Embedding,
            "Code-specific embedding model",
        ));
        registry.register(ModelSpec::new(
            "bge-m3",
            "baai/bge-m3",
            ModelKind::Embedding,
            "Multilingual embedding model",
        ));

        // ── Image ───────────────────────────────────────────────
        registry.register(
            ModelSpec::new(
                "flux-1",
                "black-forest-labs/flux.1-dev",
                ModelKind::Image,
                "FLUX.1 for text-to-image generation",
            )
            .with_route("genai/black-forest-labs/flux.1-dev"),
        );
        registry.register(
            ModelSpec::new(
                "bria-2.3",
                "briaai/bria-2.3",
                ModelKind::Image,
                "BRIA 2.3 for high-quality image generation",
            )
            .with_route("genai/briaai/bria-2.3"),
        );

        registry
    }

    /// Register a model spec. Re-registering an id replaces the spec.
    pub fn register(&mut self, spec: ModelSpec) {
        if !self.specs.contains_key(&spec.id) {
            self.order.push(spec.id.clone());
        }
        self.specs.insert(spec.id.clone(), spec);
    }

    /// Get a spec by id.
    pub fn get(&self, id: &str) -> Option<&ModelSpec> {
        self.specs.get(id)
    }

    /// All specs in registration order.
    pub fn list(&self) -> Vec<&ModelSpec> {
        self.order.iter().filter_map(|id| self.specs.get(id)).collect()
    }

    /// Specs of one kind, in registration order.
    pub fn by_kind(&self, kind: ModelKind) -> Vec<&ModelSpec> {
        self.list().into_iter().filter(|s| s.kind == kind).collect()
    }

    /// Get a spec by id, requiring a specific kind.
    pub fn spec_for_kind(&self, id: &str, kind: ModelKind) -> Result<&ModelSpec> {
        let spec = self
            .get(id)
            .ok_or_else(|| WeftError::ModelNotFound(id.to_string()))?;
        if spec.kind != kind {
            return Err(WeftError::ModelKindMismatch {
                model: id.to_string(),
                operation: kind.to_string(),
            });
        }
        Ok(spec)
    }

    /// Resolve a model to an invocable handle.
    ///
    /// The shared endpoint client is built lazily on the first call, so a
    /// registry can be constructed and browsed without credentials.
    pub async fn handle(&self, id: &str) -> Result<ModelHandle> {
        let spec = self
            .get(id)
            .ok_or_else(|| WeftError::ModelNotFound(id.to_string()))?
            .clone();

        let client = self
            .client
            .get_or_try_init(|| async {
                debug!(base_url = %self.api.base_url, "Building endpoint client");
                EndpointClient::new(&self.api).map(Arc::new)
            })
            .await?
            .clone();

        Ok(ModelHandle { spec, client })
    }
}

/// A model spec bound to the endpoint client, ready to invoke.
pub struct ModelHandle {
    spec: ModelSpec,
    client: Arc<EndpointClient>,
}

impl ModelHandle {
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub async fn chat(&self, messages: &[Message], params: &ChatParams) -> Result<ChatResponse> {
        self.require_kind(ModelKind::Chat)?;
        self.client.chat(&self.spec.upstream, messages, params).await
    }

    pub async fn embed(&self, input: &[String]) -> Result<EmbeddingResponse> {
        self.require_kind(ModelKind::Embedding)?;
        self.client.embed(&self.spec.upstream, input).await
    }

    pub async fn generate_image(
        &self,
        prompt: &str,
        params: &ImageParams,
    ) -> Result<ImageResponse> {
        self.require_kind(ModelKind::Image)?;
        let route = self.spec.route.as_deref().unwrap_or("infer");
        self.client.generate_image(route, prompt, params).await
    }

    fn require_kind(&self, kind: ModelKind) -> Result<()> {
        if self.spec.kind != kind {
            return Err(WeftError::ModelKindMismatch {
                model: self.spec.id.clone(),
                operation: kind.to_string(),
            });
        }
        Ok(())
    }
}
