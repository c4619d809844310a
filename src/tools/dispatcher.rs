//! Tool dispatch.
//!
//! # Responsibilities
//! - Resolve a completed call against the registry by exact name
//! - Validate arguments, inject caller context, invoke the tool
//! - Convert every outcome into a `tool_result` envelope
//! - Run a batch of calls concurrently, each in its own task
//!
//! # Design Decisions
//! - `dispatch` never returns an error; failures are data in the envelope
//! - Each call of a batch is spawned, so dropping the result stream (client
//!   gone) does not cancel an external call mid-flight
//! - A panicking tool surfaces as an error envelope via the task's `JoinError`

use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{FuturesUnordered, Stream};
use serde_json::Value;

use crate::observability::metrics;
use crate::stream::{CompletedCall, ResultEnvelope};
use crate::tools::context::CallContext;
use crate::tools::registry::ToolRegistry;
use crate::tools::ToolError;

#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run one call to completion and classify the outcome.
    pub async fn dispatch(&self, call: CompletedCall, ctx: &CallContext) -> ResultEnvelope {
        let started = Instant::now();
        let CompletedCall {
            id,
            name,
            arguments,
        } = call;

        let result = self.invoke(&name, arguments, ctx).await;
        let elapsed = started.elapsed();

        match result {
            Ok(output) => {
                tracing::info!(
                    tool = %name,
                    call_id = %id,
                    channel = ?output.category(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Tool call completed"
                );
                metrics::record_tool_invocation(&name, "success", elapsed);
                ResultEnvelope::tool_ok(name, id, output)
            }
            Err(e) => {
                let outcome = match &e {
                    ToolError::UnknownTool(_) => "unknown",
                    ToolError::InvalidArguments { .. } => "invalid_arguments",
                    _ => "error",
                };
                tracing::warn!(tool = %name, call_id = %id, error = %e, "Tool call failed");
                metrics::record_tool_invocation(&name, outcome, elapsed);
                ResultEnvelope::tool_err(name, id, e.to_string())
            }
        }
    }

    async fn invoke(
        &self,
        name: &str,
        mut arguments: serde_json::Map<String, Value>,
        ctx: &CallContext,
    ) -> Result<crate::tools::ToolOutput, ToolError> {
        let definition = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        definition
            .schema
            .validate(&Value::Object(arguments.clone()))
            .map_err(|reason| ToolError::InvalidArguments {
                tool: name.to_string(),
                reason,
            })?;

        ctx.inject(&mut arguments);
        definition.tool.invoke(name, arguments).await
    }

    /// Dispatch every call concurrently, yielding envelopes as they finish.
    ///
    /// Tasks are spawned before this returns; completion order is unspecified.
    pub fn dispatch_all(
        &self,
        calls: Vec<CompletedCall>,
        ctx: &CallContext,
    ) -> impl Stream<Item = ResultEnvelope> + Send + 'static {
        calls
            .into_iter()
            .map(|call| {
                let tool = call.name.clone();
                let call_id = call.id.clone();
                let dispatcher = self.clone();
                let ctx = ctx.clone();
                let handle = tokio::spawn(async move { dispatcher.dispatch(call, &ctx).await });

                async move {
                    match handle.await {
                        Ok(envelope) => envelope,
                        Err(e) => {
                            tracing::error!(tool = %tool, call_id = %call_id, error = %e, "Tool task aborted");
                            metrics::record_tool_invocation(&tool, "panic", Default::default());
                            ResultEnvelope::tool_err(tool, call_id, format!("tool task failed: {e}"))
                        }
                    }
                }
            })
            .collect::<FuturesUnordered<_>>()
    }
}
