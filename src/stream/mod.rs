//! Token-stream aggregation subsystem.
//!
//! # Data Flow
//! ```text
//! ChatModel token stream
//!     → event.rs (TextDelta | ToolCallDelta | End)
//!     → aggregator.rs (per-call buffers, tool_start on first name)
//!     → finish() → completed calls for the dispatcher
//!     → envelope.rs (ResultEnvelope, the only output contract)
//! ```
//!
//! # Design Decisions
//! - One aggregator per stream; nothing here is shared across streams
//! - Fragments are appended in arrival order, never reordered or deduplicated
//! - A malformed argument buffer degrades to `{}` instead of failing the turn

pub mod aggregator;
pub mod envelope;
pub mod event;

pub use aggregator::{CompletedCall, StreamAggregator};
pub use envelope::ResultEnvelope;
pub use event::{StreamEvent, ToolCallDelta};
