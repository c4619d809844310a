//! Reassembly of streamed tool calls.
//!
//! # Responsibilities
//! - Resolve each fragment to a call id (given, or synthesized `call_<n>`)
//! - Accumulate argument fragments per call in arrival order
//! - Announce a call (`tool_start`) the first time its name is known
//! - On completion, parse each buffer into an argument object

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::stream::envelope::ResultEnvelope;
use crate::stream::event::ToolCallDelta;

/// A call still being streamed.
#[derive(Debug, Default)]
struct PendingToolCall {
    name: Option<String>,
    args: String,
}

/// A fully received tool call, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCall {
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// Per-stream tool call accumulator.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    calls: HashMap<String, PendingToolCall>,
    /// Call ids in first-seen order.
    order: Vec<String>,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one fragment. Returns a `tool_start` envelope when this fragment
    /// is the first to name its call.
    pub fn apply(&mut self, delta: ToolCallDelta) -> Option<ResultEnvelope> {
        let call_id = match delta.call_id {
            Some(id) if !id.is_empty() => id,
            _ => format!("call_{}", self.order.len()),
        };

        if !self.calls.contains_key(&call_id) {
            self.order.push(call_id.clone());
        }
        let call = self.calls.entry(call_id.clone()).or_default();

        let mut started = None;
        if let Some(name) = delta.name.filter(|n| !n.is_empty()) {
            if call.name.is_none() {
                tracing::debug!(call_id = %call_id, tool = %name, "Tool call started");
                started = Some(ResultEnvelope::ToolStart {
                    tool: name.clone(),
                    call_id: call_id.clone(),
                });
                call.name = Some(name);
            }
        }

        if let Some(fragment) = delta.args_fragment {
            call.args.push_str(&fragment);
        }

        started
    }

    /// Number of distinct calls seen so far.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Consume the aggregator, yielding named calls in first-seen order.
    ///
    /// Calls that never received a name are dropped. A buffer that is not a
    /// JSON object is replaced with empty arguments.
    pub fn finish(mut self) -> Vec<CompletedCall> {
        let mut completed = Vec::with_capacity(self.order.len());

        for id in self.order {
            let Some(call) = self.calls.remove(&id) else {
                continue;
            };
            let Some(name) = call.name else {
                tracing::warn!(call_id = %id, "Dropping tool call without a name");
                continue;
            };
            let arguments = parse_arguments(&id, &name, &call.args);
            completed.push(CompletedCall {
                id,
                name,
                arguments,
            });
        }

        completed
    }
}

fn parse_arguments(call_id: &str, tool: &str, buffer: &str) -> Map<String, Value> {
    if buffer.trim().is_empty() {
        return Map::new();
    }

    match serde_json::from_str::<Value>(buffer) {
        Ok(Value::Object(arguments)) => arguments,
        Ok(other) => {
            tracing::warn!(
                call_id = %call_id,
                tool = %tool,
                kind = %json_kind(&other),
                "Tool arguments are not an object, using empty arguments"
            );
            Map::new()
        }
        Err(e) => {
            tracing::warn!(
                call_id = %call_id,
                tool = %tool,
                error = %e,
                "Malformed tool arguments, using empty arguments"
            );
            Map::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
