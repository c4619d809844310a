//! Tool registry and dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! CompletedCall (from stream::aggregator)
//!     → dispatcher.rs (lookup by exact name)
//!     → schema.rs (validate arguments against the declared schema)
//!     → context.rs (inject caller identity)
//!     → registry.rs Tool variant (catalog | imaging | pricing)
//!     → ToolOutput on the tool's category channel
//!     → ResultEnvelope::ToolResult (result or error, never a panic)
//! ```
//!
//! # Design Decisions
//! - The tool set is a closed enum fixed at registration; no string-keyed handlers
//! - Each variant deserializes its own typed argument struct
//! - Every failure becomes an error-tagged envelope at the dispatcher boundary

pub mod catalog;
pub mod context;
pub mod dispatcher;
pub mod imaging;
pub mod pricing;
pub mod registry;
pub mod schema;

use serde::{Deserialize, Serialize};

use crate::resilience::JobError;

pub use catalog::{Product, ProductCatalog};
pub use context::CallContext;
pub use dispatcher::ToolDispatcher;
pub use imaging::{GeneratedImage, ImageGenerator};
pub use pricing::{PriceComparer, PriceComparison};
pub use registry::{commerce_registry, Tool, ToolDefinition, ToolRegistry};

/// Output channel of a tool, declared at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// List payload.
    Search,
    /// Media payload.
    Generation,
    /// Embedded structured payload.
    Comparison,
}

/// Result of a tool, tagged by channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "data", rename_all = "snake_case")]
pub enum ToolOutput {
    Products(Vec<Product>),
    Image(GeneratedImage),
    Comparison(PriceComparison),
}

impl ToolOutput {
    pub fn category(&self) -> ToolCategory {
        match self {
            ToolOutput::Products(_) => ToolCategory::Search,
            ToolOutput::Image(_) => ToolCategory::Generation,
            ToolOutput::Comparison(_) => ToolCategory::Comparison,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("invalid parameter schema for {tool}: {reason}")]
    Schema { tool: String, reason: String },
}
