//! Result envelopes forwarded to the transport.
//!
//! Serialized as one JSON object per envelope with a `type` discriminator:
//!
//! ```json
//! {"type":"text","content":"Looking that up"}
//! {"type":"tool_start","tool":"search_products","call_id":"call_0"}
//! {"type":"tool_result","tool":"search_products","call_id":"call_0","result":{...}}
//! {"type":"stream_error","error":"connection reset"}
//! ```

use serde::{Deserialize, Serialize};

use crate::tools::ToolOutput;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultEnvelope {
    Text {
        content: String,
    },
    ToolStart {
        tool: String,
        call_id: String,
    },
    ToolResult {
        tool: String,
        call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<ToolOutput>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    StreamError {
        error: String,
    },
}

impl ResultEnvelope {
    pub fn text(content: impl Into<String>) -> Self {
        ResultEnvelope::Text {
            content: content.into(),
        }
    }

    pub fn tool_ok(tool: impl Into<String>, call_id: impl Into<String>, output: ToolOutput) -> Self {
        ResultEnvelope::ToolResult {
            tool: tool.into(),
            call_id: call_id.into(),
            result: Some(output),
            error: None,
        }
    }

    pub fn tool_err(
        tool: impl Into<String>,
        call_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        ResultEnvelope::ToolResult {
            tool: tool.into(),
            call_id: call_id.into(),
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn stream_error(error: impl Into<String>) -> Self {
        ResultEnvelope::StreamError {
            error: error.into(),
        }
    }

    /// Call id for tool envelopes.
    pub fn call_id(&self) -> Option<&str> {
        match self {
            ResultEnvelope::ToolStart { call_id, .. }
            | ResultEnvelope::ToolResult { call_id, .. } => Some(call_id),
            _ => None,
        }
    }
}
