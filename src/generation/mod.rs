//! Image generation backend.
//!
//! # Data Flow
//! ```text
//! tools::imaging
//!     → resilience::ProtectedCaller (breaker around submit)
//!     → replicate.rs submit: POST {base}/predictions
//!     → replicate.rs poll:   GET  {base}/predictions/{id}
//! ```

pub mod replicate;

pub use replicate::{PredictionRequest, ReplicateBackend};
