//! HTTP and WebSocket transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, timeout, request id, tracing)
//!     → GET /health, /breakers, /breakers/{name} (read-only status)
//!     → GET /ws/{connection_id} → websocket.rs
//!         → agent::Orchestrator turn per message
//!         → one JSON text frame per ResultEnvelope, then "done"
//!     → connections.rs (live socket registry)
//! ```

pub mod connections;
pub mod server;
pub mod websocket;

pub use connections::{ConnectionGuard, ConnectionManager};
pub use server::{AppState, HealthResponse, HttpServer};
pub use websocket::{ClientMessage, ControlFrame};
