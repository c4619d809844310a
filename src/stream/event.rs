//! Events produced by a token-streaming model.

/// Partial tool invocation. Every field may be absent on a given fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallDelta {
    pub call_id: Option<String>,
    pub name: Option<String>,
    pub args_fragment: Option<String>,
}

impl ToolCallDelta {
    pub fn new(
        call_id: Option<&str>,
        name: Option<&str>,
        args_fragment: Option<&str>,
    ) -> Self {
        Self {
            call_id: call_id.map(str::to_string),
            name: name.map(str::to_string),
            args_fragment: args_fragment.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta(String),
    ToolCallDelta(ToolCallDelta),
    /// Explicit end of stream. A stream that stops without it was cut short.
    End,
}
