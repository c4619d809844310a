//! Offline models.
//!
//! [`EchoModel`] stands in for a real model when no API key is configured.
//! [`ScriptedModel`] replays a fixed event sequence and is what the tests drive.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{ChatModel, ChatRequest, LlmError, Role, TokenStream};
use crate::stream::StreamEvent;

const ECHO_PREVIEW_CHARS: usize = 50;
const ECHO_CHUNK_CHARS: usize = 10;

/// Echoes the last user message back in small chunks.
#[derive(Debug, Clone)]
pub struct EchoModel {
    delay: Duration,
}

impl Default for EchoModel {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(100),
        }
    }
}

impl EchoModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause between chunks.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }

    fn reply(request: &ChatRequest) -> String {
        let message = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let preview: String = message.chars().take(ECHO_PREVIEW_CHARS).collect();
        format!("Processing your request: {preview}...")
    }
}

#[async_trait]
impl ChatModel for EchoModel {
    fn name(&self) -> &str {
        "echo"
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, LlmError> {
        let chars: Vec<char> = Self::reply(&request).chars().collect();
        let chunks: Vec<String> = chars
            .chunks(ECHO_CHUNK_CHARS)
            .map(|c| c.iter().collect())
            .collect();
        let delay = self.delay;

        let stream = async_stream::stream! {
            for chunk in chunks {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(StreamEvent::TextDelta(chunk));
            }
            yield Ok(StreamEvent::End);
        };
        Ok(Box::pin(stream))
    }
}

/// Replays the same events on every call and records each request.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    events: Vec<Result<StreamEvent, LlmError>>,
    refuse: Option<LlmError>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(events: Vec<Result<StreamEvent, LlmError>>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    /// A model whose `stream_chat` fails before producing a stream.
    pub fn refusing(error: LlmError) -> Self {
        Self {
            refuse: Some(error),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        if let Some(error) = &self.refuse {
            return Err(error.clone());
        }
        Ok(Box::pin(stream::iter(self.events.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use futures_util::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn test_echo_chunks_message_preview() {
        let model = EchoModel::new();
        let request = ChatRequest {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("find me a lamp")],
            tools: Vec::new(),
        };
        let events: Vec<_> = model
            .stream_chat(request)
            .await
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(events.last(), Some(&StreamEvent::End));
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::TextDelta(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Processing your request: find me a lamp...");
        assert!(events.iter().all(|e| match e {
            StreamEvent::TextDelta(t) => t.chars().count() <= ECHO_CHUNK_CHARS,
            _ => true,
        }));
    }

    #[tokio::test]
    async fn test_scripted_replays_and_records() {
        let model = ScriptedModel::new(vec![Ok(StreamEvent::TextDelta("hi".into()))]);
        for _ in 0..2 {
            let events: Vec<_> = model.stream_chat(ChatRequest::default()).await.unwrap().collect().await;
            assert_eq!(events, vec![Ok(StreamEvent::TextDelta("hi".into()))]);
        }
        assert_eq!(model.requests().len(), 2);

        let refusing = ScriptedModel::refusing(LlmError::Http("down".into()));
        assert!(refusing.stream_chat(ChatRequest::default()).await.is_err());
        assert_eq!(refusing.requests().len(), 1);
    }
}
