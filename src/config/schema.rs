//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Name of the breaker guarding the prediction API.
pub const REPLICATE_BREAKER: &str = "replicate_api";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Circuit breakers keyed by the dependency they protect.
    pub breakers: HashMap<String, BreakerConfig>,

    /// Image generation (submit/poll prediction API).
    pub generation: GenerationConfig,

    /// Chat-completion model used to drive conversations.
    pub llm: LlmConfig,

    /// Price comparison cache settings.
    pub pricing: PricingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let mut breakers = HashMap::new();
        breakers.insert(REPLICATE_BREAKER.to_string(), BreakerConfig::replicate());

        Self {
            listener: ListenerConfig::default(),
            breakers,
            generation: GenerationConfig::default(),
            llm: LlmConfig::default(),
            pricing: PricingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Timeout for plain HTTP requests in seconds. WebSocket sessions are not bounded by it.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Circuit breaker tuning for one protected dependency.
///
/// Immutable once loaded; every breaker copies its own.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Failures inside `failure_window_secs` that trip a closed breaker.
    pub failure_threshold: u32,

    /// Sliding window for counting failures, in seconds.
    pub failure_window_secs: u64,

    /// Initial cooldown before an open breaker admits a probe, in seconds.
    pub open_timeout_secs: u64,

    /// Consecutive half-open successes required to close.
    pub half_open_success_threshold: u32,

    /// Grow the cooldown on repeated trips.
    pub exponential_backoff: bool,

    /// Growth factor applied per consecutive trip.
    pub backoff_multiplier: f64,

    /// Upper bound on the cooldown, in seconds.
    pub max_backoff_secs: u64,
}

impl BreakerConfig {
    /// Preset used for the prediction API.
    pub fn replicate() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout_secs: 30,
            max_backoff_secs: 120,
            ..Self::default()
        }
    }

    pub fn failure_window(&self) -> Duration {
        Duration::from_secs(self.failure_window_secs)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_secs(self.open_timeout_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window_secs: 60,
            open_timeout_secs: 60,
            half_open_success_threshold: 3,
            exponential_backoff: true,
            backoff_multiplier: 2.0,
            max_backoff_secs: 300,
        }
    }
}

/// Image generation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Prediction API base URL.
    pub base_url: String,

    /// Model identifier (`owner/name`).
    pub model: String,

    /// Environment variable holding the API token. Generation is mocked when unset.
    pub api_token_env: String,

    /// Delay between status polls in milliseconds.
    pub poll_interval_ms: u64,

    /// Maximum status polls before giving up.
    pub max_poll_attempts: u32,

    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    /// Breaker (from `[breakers]`) guarding submissions.
    pub breaker: String,
}

impl GenerationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.replicate.com/v1".to_string(),
            model: "black-forest-labs/flux-schnell".to_string(),
            api_token_env: "REPLICATE_API_TOKEN".to_string(),
            poll_interval_ms: 1000,
            max_poll_attempts: 60,
            request_timeout_secs: 120,
            breaker: REPLICATE_BREAKER.to_string(),
        }
    }
}

/// Chat-completion configuration (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL.
    pub base_url: String,

    /// Model identifier.
    pub model: String,

    /// Environment variable holding the API key. An offline echo model is used when unset.
    pub api_key_env: String,

    /// Completion token cap.
    pub max_tokens: u32,

    /// HTTP timeout for establishing the stream, in seconds.
    pub request_timeout_secs: u64,

    /// Longest silence tolerated mid-stream before the turn fails, in seconds.
    pub stream_idle_timeout_secs: u64,

    /// System prompt prepended to every conversation turn.
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "anthropic/claude-sonnet-4".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            max_tokens: 4096,
            request_timeout_secs: 60,
            stream_idle_timeout_secs: 30,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a shopping assistant. \
Use search_products to find products, generate_image to create product visualizations, \
and compare_prices to compare prices across stores. Explain which tools you use and keep answers concise.";

/// Price comparison cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Time a comparison stays cached, in seconds.
    pub cache_ttl_secs: u64,

    /// Maximum cached comparisons.
    pub cache_capacity: usize,
}

impl PricingConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3600,
            cache_capacity: 1000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
