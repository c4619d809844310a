//! Prediction API client implementing the submit/poll contract.
//!
//! # Responsibilities
//! - Create predictions with the model's generation inputs
//! - Fetch prediction status and map it to [`JobStatus`]
//! - Report non-2xx responses with their status and body

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::resilience::{DependencyError, JobBackend, JobStatus};

const GUIDANCE_SCALE: f64 = 7.5;
const INFERENCE_STEPS: u32 = 4;

/// Inputs for one prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
    pub model: String,
    pub prompt: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Clone)]
pub struct ReplicateBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl fmt::Debug for ReplicateBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicateBackend")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl ReplicateBackend {
    /// Build a client for `base_url` authenticating with `token`.
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, DependencyError> {
        let mut normalized = base_url.trim_end_matches('/').to_string();
        normalized.push('/');
        let base_url = Url::parse(&normalized)
            .map_err(|e| DependencyError::Transport(format!("invalid base URL '{base_url}': {e}")))?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| DependencyError::Transport(format!("invalid API token: {e}")))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        tracing::info!(base_url = %base_url, "Prediction client initialized");
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, DependencyError> {
        self.base_url
            .join(path)
            .map_err(|e| DependencyError::Transport(format!("invalid endpoint '{path}': {e}")))
    }

    async fn read_prediction(response: reqwest::Response) -> Result<Prediction, DependencyError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DependencyError::Status {
                code: status.as_u16(),
                body,
            });
        }
        response
            .json::<Prediction>()
            .await
            .map_err(|e| DependencyError::Decode(e.to_string()))
    }
}

#[async_trait]
impl JobBackend for ReplicateBackend {
    type Request = PredictionRequest;
    type Output = Vec<String>;

    async fn submit(&self, request: &PredictionRequest) -> Result<String, DependencyError> {
        let body = json!({
            "version": request.model,
            "input": {
                "prompt": request.prompt,
                "width": request.width,
                "height": request.height,
                "num_outputs": 1,
                "guidance_scale": GUIDANCE_SCALE,
                "num_inference_steps": INFERENCE_STEPS,
            }
        });

        let response = self
            .client
            .post(self.endpoint("predictions")?)
            .json(&body)
            .send()
            .await?;
        let prediction = Self::read_prediction(response).await?;

        tracing::debug!(prediction_id = %prediction.id, model = %request.model, "Prediction created");
        Ok(prediction.id)
    }

    async fn poll(&self, job_id: &str) -> Result<JobStatus<Vec<String>>, DependencyError> {
        let response = self
            .client
            .get(self.endpoint(&format!("predictions/{job_id}"))?)
            .send()
            .await?;
        let prediction = Self::read_prediction(response).await?;
        map_status(prediction)
    }
}

fn map_status(prediction: Prediction) -> Result<JobStatus<Vec<String>>, DependencyError> {
    match prediction.status.as_str() {
        "starting" | "processing" => Ok(JobStatus::Pending),
        "succeeded" => Ok(JobStatus::Succeeded(output_urls(prediction.output))),
        "failed" => {
            let reason = match prediction.error {
                Some(Value::String(message)) => message,
                Some(Value::Null) | None => "Unknown error".to_string(),
                Some(other) => other.to_string(),
            };
            Ok(JobStatus::Failed(reason))
        }
        "canceled" => Ok(JobStatus::Canceled),
        other => Err(DependencyError::Decode(format!(
            "unknown prediction status '{other}'"
        ))),
    }
}

/// Output is either a single URL or a list of URLs.
fn output_urls(output: Option<Value>) -> Vec<String> {
    match output {
        Some(Value::String(url)) => vec![url],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(url) => Some(url),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
