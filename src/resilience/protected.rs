//! Protected submit/poll calls.
//!
//! # Responsibilities
//! - Submit a job through the dependency's circuit breaker
//! - Poll the job at a fixed interval until it reaches a terminal status
//! - Turn an open breaker into a fallback outcome instead of an error
//!
//! # Design Decisions
//! - Only `submit` is a breaker-observed call; polling a job that was accepted
//!   is breaker-transparent, whatever the poll outcome
//! - No automatic resubmission; retrying is the caller's decision
//! - The loop sleeps between polls, never after the last attempt

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::resilience::circuit_breaker::{BreakerError, CircuitBreaker};

/// Reason attached to fallback results while a breaker is open.
pub const SERVICE_UNAVAILABLE: &str = "Service temporarily unavailable";

/// Status of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus<T> {
    Pending,
    Succeeded(T),
    Failed(String),
    Canceled,
}

/// Failure talking to the external dependency.
#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("dependency returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("failed to decode dependency response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for DependencyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DependencyError::Decode(e.to_string())
        } else {
            DependencyError::Transport(e.to_string())
        }
    }
}

/// Terminal failure of a protected job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Submission failed; recorded against the breaker.
    #[error("submit failed: {0}")]
    Dependency(DependencyError),

    /// A status poll failed after a successful submit.
    #[error("poll failed: {0}")]
    Poll(DependencyError),

    /// The job reported `failed` or `canceled`.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// No terminal status within the allowed attempts.
    #[error("job timed out after {attempts} polls")]
    TimedOut { attempts: u32 },
}

/// Result of [`ProtectedCaller::run`] that the caller can render.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome<T> {
    Completed { job_id: String, output: T },
    /// The breaker refused the submit; nothing was sent.
    Unavailable { reason: String, retry_in: Duration },
}

/// A two-phase external operation.
#[async_trait]
pub trait JobBackend: Send + Sync {
    type Request: Send + Sync;
    type Output: Send;

    /// Start a job, returning its identifier.
    async fn submit(&self, request: &Self::Request) -> Result<String, DependencyError>;

    /// Current status of a job.
    async fn poll(&self, job_id: &str) -> Result<JobStatus<Self::Output>, DependencyError>;
}

/// Poll loop tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 60,
        }
    }
}

/// Runs a [`JobBackend`] behind a circuit breaker.
pub struct ProtectedCaller<R, O> {
    breaker: Arc<CircuitBreaker>,
    backend: Arc<dyn JobBackend<Request = R, Output = O>>,
    poll: PollSettings,
}

impl<R, O> fmt::Debug for ProtectedCaller<R, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedCaller")
            .field("breaker", &self.breaker.name())
            .field("poll", &self.poll)
            .finish()
    }
}

impl<R, O> ProtectedCaller<R, O>
where
    R: Send + Sync,
    O: Send,
{
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        backend: Arc<dyn JobBackend<Request = R, Output = O>>,
        poll: PollSettings,
    ) -> Self {
        Self {
            breaker,
            backend,
            poll,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Submit `request` and wait for the job to finish.
    pub async fn run(&self, request: &R) -> Result<JobOutcome<O>, JobError> {
        let backend = &self.backend;
        let submitted = self
            .breaker
            .execute(|| async move { backend.submit(request).await })
            .await;

        let job_id = match submitted {
            Ok(job_id) => job_id,
            Err(BreakerError::Open { breaker, retry_in }) => {
                tracing::warn!(breaker = %breaker, retry_in = ?retry_in, "Circuit open, returning fallback");
                return Ok(JobOutcome::Unavailable {
                    reason: SERVICE_UNAVAILABLE.to_string(),
                    retry_in,
                });
            }
            Err(BreakerError::Inner(e)) => return Err(JobError::Dependency(e)),
        };

        tracing::debug!(breaker = %self.breaker.name(), job_id = %job_id, "Job submitted");
        let output = self.wait(&job_id).await?;
        Ok(JobOutcome::Completed { job_id, output })
    }

    async fn wait(&self, job_id: &str) -> Result<O, JobError> {
        for attempt in 1..=self.poll.max_attempts {
            match self.backend.poll(job_id).await.map_err(JobError::Poll)? {
                JobStatus::Succeeded(output) => {
                    tracing::debug!(job_id = %job_id, attempt, "Job succeeded");
                    return Ok(output);
                }
                JobStatus::Failed(reason) => {
                    tracing::warn!(job_id = %job_id, reason = %reason, "Job failed");
                    return Err(JobError::GenerationFailed(reason));
                }
                JobStatus::Canceled => {
                    tracing::warn!(job_id = %job_id, "Job canceled");
                    return Err(JobError::GenerationFailed("job was canceled".to_string()));
                }
                JobStatus::Pending => {
                    if attempt < self.poll.max_attempts {
                        tokio::time::sleep(self.poll.interval).await;
                    }
                }
            }
        }

        tracing::warn!(job_id = %job_id, attempts = self.poll.max_attempts, "Job timed out");
        Err(JobError::TimedOut {
            attempts: self.poll.max_attempts,
        })
    }
}
