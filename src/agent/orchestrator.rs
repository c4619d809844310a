//! One conversation turn.
//!
//! # Responsibilities
//! - Build the model request (system prompt, user message, tool schemas)
//! - Forward text deltas as `text` envelopes as soon as they arrive
//! - Feed tool-call fragments to a per-turn [`StreamAggregator`]
//! - After the model's end-of-stream, dispatch every completed call
//!
//! # Design Decisions
//! - Tools run only after `End`; a stream that fails or stops early yields a
//!   single `stream_error` and nothing is dispatched
//! - Dispatch happens in spawned tasks, so a consumer that goes away
//!   mid-turn leaves in-flight dependency calls to finish against the breaker

use std::sync::Arc;

use futures_util::{Stream, StreamExt};

use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::stream::{ResultEnvelope, StreamAggregator, StreamEvent};
use crate::tools::{CallContext, ToolDispatcher};

#[derive(Clone)]
pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    dispatcher: ToolDispatcher,
    system_prompt: String,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("model", &self.model.name())
            .field("tools", &self.dispatcher.registry().len())
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        dispatcher: ToolDispatcher,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            model,
            dispatcher,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    fn request(&self, message: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![
                ChatMessage::system(self.system_prompt.clone()),
                ChatMessage::user(message),
            ],
            tools: self.dispatcher.registry().function_schemas(),
        }
    }

    /// Stream the envelopes for one user message.
    pub fn stream_reply(
        &self,
        message: String,
        ctx: CallContext,
    ) -> impl Stream<Item = ResultEnvelope> + Send + 'static {
        let this = self.clone();

        async_stream::stream! {
            let request = this.request(&message);
            tracing::debug!(model = %this.model.name(), tools = request.tools.len(), "Starting turn");

            let mut tokens = match this.model.stream_chat(request).await {
                Ok(tokens) => tokens,
                Err(e) => {
                    tracing::error!(model = %this.model.name(), error = %e, "Model request failed");
                    yield ResultEnvelope::stream_error(e.to_string());
                    return;
                }
            };

            let mut aggregator = StreamAggregator::new();
            let mut ended = false;
            while let Some(event) = tokens.next().await {
                match event {
                    Ok(StreamEvent::TextDelta(text)) => {
                        if !text.is_empty() {
                            yield ResultEnvelope::text(text);
                        }
                    }
                    Ok(StreamEvent::ToolCallDelta(delta)) => {
                        if let Some(started) = aggregator.apply(delta) {
                            yield started;
                        }
                    }
                    Ok(StreamEvent::End) => {
                        ended = true;
                        break;
                    }
                    Err(e) => {
                        tracing::error!(model = %this.model.name(), error = %e, "Model stream failed");
                        yield ResultEnvelope::stream_error(e.to_string());
                        return;
                    }
                }
            }

            if !ended {
                tracing::warn!(model = %this.model.name(), "Model stream closed before end marker");
                yield ResultEnvelope::stream_error("model stream ended unexpectedly");
                return;
            }

            let calls = aggregator.finish();
            if calls.is_empty() {
                return;
            }
            tracing::info!(calls = calls.len(), "Dispatching tool calls");

            let mut results = std::pin::pin!(this.dispatcher.dispatch_all(calls, &ctx));
            while let Some(envelope) = results.next().await {
                yield envelope;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PricingConfig;
    use crate::llm::{LlmError, Role, ScriptedModel};
    use crate::stream::ToolCallDelta;
    use crate::tools::{commerce_registry, ImageGenerator, PriceComparer, ProductCatalog, ToolOutput};

    fn orchestrator(model: Arc<ScriptedModel>) -> Orchestrator {
        let registry = commerce_registry(
            Arc::new(ProductCatalog::new()),
            Arc::new(ImageGenerator::unconfigured("flux")),
            Arc::new(PriceComparer::new(&PricingConfig::default())),
        )
        .unwrap();
        Orchestrator::new(model, ToolDispatcher::new(Arc::new(registry)), "be helpful")
    }

    fn tool_delta(id: &str, name: Option<&str>, args: &str) -> Result<StreamEvent, LlmError> {
        Ok(StreamEvent::ToolCallDelta(ToolCallDelta::new(Some(id), name, Some(args))))
    }

    async fn run(model: Arc<ScriptedModel>) -> Vec<ResultEnvelope> {
        orchestrator(model)
            .stream_reply("find a desk".to_string(), CallContext::default())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_text_then_tool_start_then_result() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(StreamEvent::TextDelta("Looking".into())),
            tool_delta("c1", Some("search_products"), "{\"query\":"),
            tool_delta("c1", None, "\"desk\"}"),
            Ok(StreamEvent::End),
        ]));
        let envelopes = run(model.clone()).await;

        assert_eq!(envelopes.len(), 3);
        assert_eq!(envelopes[0], ResultEnvelope::text("Looking"));
        assert_eq!(
            envelopes[1],
            ResultEnvelope::ToolStart {
                tool: "search_products".into(),
                call_id: "c1".into()
            }
        );
        assert!(matches!(
            &envelopes[2],
            ResultEnvelope::ToolResult { result: Some(ToolOutput::Products(p)), .. } if p[0].name == "Premium Desk"
        ));

        let request = &model.requests()[0];
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[1].content, "find a desk");
        assert_eq!(request.tools.len(), 3);
    }

    #[tokio::test]
    async fn test_stream_failure_skips_dispatch() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_delta("c1", Some("search_products"), "{\"query\":\"x\"}"),
            Err(LlmError::Stream("connection reset".into())),
            Ok(StreamEvent::End),
        ]));
        let envelopes = run(model).await;

        assert_eq!(envelopes.len(), 2);
        assert!(matches!(envelopes[0], ResultEnvelope::ToolStart { .. }));
        assert_eq!(
            envelopes[1],
            ResultEnvelope::stream_error("stream error: connection reset")
        );
    }

    #[tokio::test]
    async fn test_stream_cut_short_is_reported() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(StreamEvent::TextDelta("partial".into())),
            tool_delta("c1", Some("compare_prices"), "{\"product_name\":\"tv\"}"),
        ]));
        let envelopes = run(model).await;

        assert_eq!(
            envelopes.last(),
            Some(&ResultEnvelope::stream_error("model stream ended unexpectedly"))
        );
        assert!(!envelopes
            .iter()
            .any(|e| matches!(e, ResultEnvelope::ToolResult { .. })));
    }

    #[tokio::test]
    async fn test_refused_request_yields_single_error() {
        let model = Arc::new(ScriptedModel::refusing(LlmError::Status {
            code: 401,
            body: "bad key".into(),
        }));
        let envelopes = run(model).await;
        assert_eq!(
            envelopes,
            vec![ResultEnvelope::stream_error(
                "model API returned status 401: bad key"
            )]
        );
    }

    #[tokio::test]
    async fn test_malformed_arguments_still_dispatch() {
        let model = Arc::new(ScriptedModel::new(vec![
            tool_delta("c1", Some("search_products"), "{\"query\":"),
            Ok(StreamEvent::End),
        ]));
        let envelopes = run(model).await;

        // Empty arguments then fail schema validation on `query`.
        match &envelopes[1] {
            ResultEnvelope::ToolResult { error: Some(error), call_id, .. } => {
                assert_eq!(call_id, "c1");
                assert!(error.contains("query"));
            }
            other => panic!("unexpected envelope {other:?}"),
        }
    }
}
