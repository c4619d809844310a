//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, TOOLGATE_* overrides, secrets from env)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → lifecycle::startup wires subsystems from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breakers copy their own tuning
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets never live in the file; sections name the env var to read

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, load_config, ConfigError};
pub use schema::BreakerConfig;
pub use schema::GatewayConfig;
pub use schema::ListenerConfig;
