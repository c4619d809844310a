//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Tool handler calling an external dependency:
//!     → protected.rs (submit through the breaker, then poll to a terminal status)
//!     → circuit_breaker.rs (admit or fast-fail, record outcome, trip/recover)
//!     → backoff.rs (cooldown for each trip)
//!
//! Startup:
//!     [breakers] config → registry.rs → Arc<CircuitBreaker> handed to callers
//! ```
//!
//! # Design Decisions
//! - Breakers are constructed at startup and injected; there is no global instance
//! - An open breaker is a fallback outcome for callers, never a hard error
//! - Submissions are never retried here; backoff already spaces attempts

pub mod backoff;
pub mod circuit_breaker;
pub mod protected;
pub mod registry;

pub use circuit_breaker::{BreakerError, BreakerStatus, CircuitBreaker, CircuitState};
pub use protected::{
    DependencyError, JobBackend, JobError, JobOutcome, JobStatus, PollSettings, ProtectedCaller,
};
pub use registry::BreakerRegistry;
