//! Startup wiring.
//!
//! # Responsibilities
//! - Build every breaker named in config
//! - Construct the prediction backend and chat model from their secrets,
//!   falling back to offline stand-ins when a secret is missing
//! - Assemble the tool registry, dispatcher and orchestrator into [`AppState`]
//!
//! # Design Decisions
//! - Fail fast: a broken base URL or header value aborts startup
//! - Secrets are resolved once here and never stored in config

use std::sync::Arc;
use std::time::Duration;

use crate::agent::Orchestrator;
use crate::config::loader::read_secret;
use crate::config::GatewayConfig;
use crate::generation::{PredictionRequest, ReplicateBackend};
use crate::http::{AppState, ConnectionManager};
use crate::llm::{ChatModel, EchoModel, LlmError, OpenAiCompatClient, OpenAiSettings};
use crate::resilience::{
    BreakerRegistry, DependencyError, JobBackend, PollSettings, ProtectedCaller,
};
use crate::tools::{
    commerce_registry, ImageGenerator, PriceComparer, ProductCatalog, ToolDispatcher, ToolError,
};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("generation breaker '{0}' is not configured")]
    MissingBreaker(String),

    #[error("failed to build generation backend: {0}")]
    Generation(#[from] DependencyError),

    #[error("failed to build chat model client: {0}")]
    Llm(#[from] LlmError),

    #[error("failed to build tool registry: {0}")]
    Tools(#[from] ToolError),
}

/// Secrets resolved from the environment.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub generation_token: Option<String>,
    pub llm_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env(config: &GatewayConfig) -> Self {
        Self {
            generation_token: read_secret(&config.generation.api_token_env),
            llm_api_key: read_secret(&config.llm.api_key_env),
        }
    }
}

/// Build application state with secrets read from the environment.
pub fn build_state(config: &GatewayConfig) -> Result<AppState, StartupError> {
    build_state_with(config, Secrets::from_env(config))
}

pub fn build_state_with(config: &GatewayConfig, secrets: Secrets) -> Result<AppState, StartupError> {
    let breakers = Arc::new(BreakerRegistry::from_config(&config.breakers));
    tracing::info!(breakers = breakers.len(), "Circuit breakers initialized");

    let generation = &config.generation;
    let images = match secrets.generation_token {
        Some(token) => {
            let breaker = breakers
                .get(&generation.breaker)
                .ok_or_else(|| StartupError::MissingBreaker(generation.breaker.clone()))?;
            let backend = ReplicateBackend::new(
                &generation.base_url,
                &token,
                Duration::from_secs(generation.request_timeout_secs),
            )?;
            let backend: Arc<dyn JobBackend<Request = PredictionRequest, Output = Vec<String>>> =
                Arc::new(backend);
            let caller = ProtectedCaller::new(
                breaker,
                backend,
                PollSettings {
                    interval: generation.poll_interval(),
                    max_attempts: generation.max_poll_attempts,
                },
            );
            ImageGenerator::new(caller, generation.model.clone())
        }
        None => {
            tracing::warn!(
                env = %generation.api_token_env,
                "No image generation token set, image tool returns mock results"
            );
            ImageGenerator::unconfigured(generation.model.clone())
        }
    };

    let model: Arc<dyn ChatModel> = match secrets.llm_api_key {
        Some(api_key) => Arc::new(OpenAiCompatClient::new(OpenAiSettings {
            base_url: config.llm.base_url.clone(),
            api_key,
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            connect_timeout: Duration::from_secs(config.llm.request_timeout_secs),
            idle_timeout: Duration::from_secs(config.llm.stream_idle_timeout_secs),
        })?),
        None => {
            tracing::warn!(env = %config.llm.api_key_env, "No chat model API key set, using offline echo model");
            Arc::new(EchoModel::new())
        }
    };

    let registry = commerce_registry(
        Arc::new(ProductCatalog::new()),
        Arc::new(images),
        Arc::new(PriceComparer::new(&config.pricing)),
    )?;
    tracing::info!(tools = registry.len(), model = %model.name(), "Tool registry ready");

    let orchestrator = Orchestrator::new(
        model,
        ToolDispatcher::new(Arc::new(registry)),
        config.llm.system_prompt.clone(),
    );

    Ok(AppState {
        breakers,
        orchestrator: Arc::new(orchestrator),
        connections: ConnectionManager::new(),
    })
}
