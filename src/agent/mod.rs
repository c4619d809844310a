//! Conversation turn orchestration.
//!
//! # Data Flow
//! ```text
//! user message + CallContext
//!     → llm::ChatModel::stream_chat (system prompt, user message, tool schemas)
//!     → stream::StreamAggregator (text passthrough, tool_start)
//!     → End → tools::ToolDispatcher::dispatch_all
//!     → ResultEnvelope stream to the transport
//! ```

pub mod orchestrator;

pub use orchestrator::Orchestrator;
