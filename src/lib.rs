//! Resilient tool-calling gateway library.

pub mod agent;
pub mod config;
pub mod generation;
pub mod http;
pub mod lifecycle;
pub mod llm;
pub mod observability;
pub mod resilience;
pub mod stream;
pub mod tools;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
