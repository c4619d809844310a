//! OpenAI-compatible streaming chat client.
//!
//! # Responsibilities
//! - POST `chat/completions` with `stream: true` and the tool declarations
//! - Parse the SSE body with `eventsource-stream`
//! - Turn each chunk into text and tool-call deltas
//!
//! # Design Decisions
//! - Follow-up tool-call fragments carry only an `index`; the decoder maps
//!   them back to the id first seen for that index, or to `call_idx_{index}`
//!   when the first fragment had no id
//! - A body that goes quiet for longer than the idle timeout ends the stream
//!   with a stream error
//! - `[DONE]` is the only end-of-stream marker; a body that closes without
//!   it ends the stream with no `End` event

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::{ChatModel, ChatRequest, LlmError, TokenStream};
use crate::stream::{StreamEvent, ToolCallDelta};

const DONE_MARKER: &str = "[DONE]";

/// Settings for [`OpenAiCompatClient`].
#[derive(Clone)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    /// Deadline for receiving response headers.
    pub connect_timeout: Duration,
    /// Longest gap allowed between two body events.
    pub idle_timeout: Duration,
}

impl fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    settings: OpenAiSettings,
}

impl OpenAiCompatClient {
    pub fn new(settings: OpenAiSettings) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().build()?;
        tracing::info!(base_url = %settings.base_url, model = %settings.model, "Chat model client initialized");
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "messages": request.messages,
            "stream": true,
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.clone());
        }
        body
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.settings.model
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, LlmError> {
        let send = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&self.body(&request))
            .send();

        let response = tokio::time::timeout(self.settings.connect_timeout, send)
            .await
            .map_err(|_| LlmError::Http("timed out waiting for model response".to_string()))??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let idle_timeout = self.settings.idle_timeout;
        let mut events = response.bytes_stream().eventsource();
        let stream = async_stream::stream! {
            let mut decoder = ChunkDecoder::default();
            loop {
                let event = match tokio::time::timeout(idle_timeout, events.next()).await {
                    Ok(Some(event)) => event,
                    Ok(None) => break,
                    Err(_) => {
                        tracing::warn!(idle_timeout = ?idle_timeout, "Model stream went idle");
                        yield Err(LlmError::Stream(format!(
                            "no data from model for {}s",
                            idle_timeout.as_secs_f64()
                        )));
                        return;
                    }
                };
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(LlmError::Stream(e.to_string()));
                        return;
                    }
                };

                let data = event.data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == DONE_MARKER {
                    yield Ok(StreamEvent::End);
                    return;
                }

                match decoder.decode(data) {
                    Ok(decoded) => {
                        for item in decoded {
                            yield Ok(item);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallChunk>,
}

#[derive(Debug, Deserialize)]
struct ToolCallChunk {
    #[serde(default)]
    index: Option<u64>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionChunk>,
}

#[derive(Debug, Deserialize)]
struct FunctionChunk {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Stateful chunk decoder for one response.
#[derive(Debug, Default)]
pub(crate) struct ChunkDecoder {
    ids_by_index: HashMap<u64, String>,
}

impl ChunkDecoder {
    pub(crate) fn decode(&mut self, data: &str) -> Result<Vec<StreamEvent>, LlmError> {
        let chunk: Chunk = serde_json::from_str(data).map_err(|e| LlmError::Parse(e.to_string()))?;

        if let Some(error) = chunk.error {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(LlmError::Stream(message));
        }

        let mut events = Vec::new();
        for delta in chunk.choices.into_iter().filter_map(|c| c.delta) {
            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                events.push(StreamEvent::TextDelta(content));
            }
            for call in delta.tool_calls {
                let call_id = self.resolve_id(call.index, call.id);
                let (name, args_fragment) = match call.function {
                    Some(function) => (function.name, function.arguments),
                    None => (None, None),
                };
                events.push(StreamEvent::ToolCallDelta(ToolCallDelta {
                    call_id,
                    name: name.filter(|n| !n.is_empty()),
                    args_fragment: args_fragment.filter(|a| !a.is_empty()),
                }));
            }
        }
        Ok(events)
    }

    fn resolve_id(&mut self, index: Option<u64>, id: Option<String>) -> Option<String> {
        match (index, id.filter(|id| !id.is_empty())) {
            (Some(index), Some(id)) => Some(self.ids_by_index.entry(index).or_insert(id).clone()),
            (None, Some(id)) => Some(id),
            (Some(index), None) => Some(
                self.ids_by_index
                    .entry(index)
                    .or_insert_with(|| format!("call_idx_{index}"))
                    .clone(),
            ),
            (None, None) => None,
        }
    }
}
