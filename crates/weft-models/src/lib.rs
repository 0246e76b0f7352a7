pub mod client;
pub mod registry;

pub use client::{
    ChatParams, ChatResponse, EmbeddingResponse, EndpointClient, ImageParams, ImageResponse,
    Message,
};
pub use registry::{ModelHandle, ModelKind, ModelRegistry, ModelSpec};
