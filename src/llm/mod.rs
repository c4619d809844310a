//! Chat-completion models.
//!
//! # Data Flow
//! ```text
//! agent::Orchestrator
//!     → ChatModel::stream_chat(ChatRequest)
//!     → openai.rs (SSE chat/completions) | scripted.rs (offline)
//!     → TokenStream of StreamEvent (TextDelta | ToolCallDelta | End)
//! ```
//!
//! # Design Decisions
//! - One streaming contract for every model; no blocking completion path
//! - A stream that stops without `End` was cut short and is reported as such

pub mod openai;
pub mod scripted;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::stream::StreamEvent;

pub use openai::{OpenAiCompatClient, OpenAiSettings};
pub use scripted::{EchoModel, ScriptedModel};

/// Events of one model response.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("model API returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("failed to parse stream chunk: {0}")]
    Parse(String),

    #[error("stream error: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Http(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One streaming completion request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Function declarations offered to the model.
    pub tools: Vec<Value>,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, LlmError>;
}
