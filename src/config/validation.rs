//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (generation references an existing breaker)
//! - Validate value ranges (thresholds > 0, multiplier >= 1, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{BreakerConfig, GatewayConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            "must be a socket address",
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be greater than 0",
        ));
    }

    let mut names: Vec<_> = config.breakers.keys().collect();
    names.sort();
    for name in names {
        validate_breaker(name, &config.breakers[name], &mut errors);
    }

    let generation = &config.generation;
    if !config.breakers.contains_key(&generation.breaker) {
        errors.push(ValidationError::new(
            "generation.breaker",
            format!("references unknown breaker '{}'", generation.breaker),
        ));
    }
    if generation.poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "generation.poll_interval_ms",
            "must be greater than 0",
        ));
    }
    if generation.max_poll_attempts == 0 {
        errors.push(ValidationError::new(
            "generation.max_poll_attempts",
            "must be greater than 0",
        ));
    }
    if url::Url::parse(&generation.base_url).is_err() {
        errors.push(ValidationError::new("generation.base_url", "must be a URL"));
    }
    if url::Url::parse(&config.llm.base_url).is_err() {
        errors.push(ValidationError::new("llm.base_url", "must be a URL"));
    }
    if config.llm.stream_idle_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "llm.stream_idle_timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.pricing.cache_capacity == 0 {
        errors.push(ValidationError::new(
            "pricing.cache_capacity",
            "must be greater than 0",
        ));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_breaker(name: &str, breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    let field = |key: &str| format!("breakers.{name}.{key}");

    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            field("failure_threshold"),
            "must be greater than 0",
        ));
    }
    if breaker.failure_window_secs == 0 {
        errors.push(ValidationError::new(
            field("failure_window_secs"),
            "must be greater than 0",
        ));
    }
    if breaker.half_open_success_threshold == 0 {
        errors.push(ValidationError::new(
            field("half_open_success_threshold"),
            "must be greater than 0",
        ));
    }
    if !breaker.backoff_multiplier.is_finite() || breaker.backoff_multiplier < 1.0 {
        errors.push(ValidationError::new(
            field("backoff_multiplier"),
            "must be a finite number >= 1.0",
        ));
    }
    if breaker.max_backoff_secs < breaker.open_timeout_secs {
        errors.push(ValidationError::new(
            field("max_backoff_secs"),
            "must be at least open_timeout_secs",
        ));
    }
}
