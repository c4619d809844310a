//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;

use toolgate::config::BreakerConfig;
use toolgate::generation::PredictionRequest;
use toolgate::http::{AppState, HttpServer};
use toolgate::lifecycle::Shutdown;
use toolgate::resilience::{
    CircuitBreaker, DependencyError, JobBackend, JobStatus, PollSettings, ProtectedCaller,
};

/// Breaker tuned like the scenario tables: threshold 3, 60 s window,
/// 30 s open timeout, 2 successes to close.
pub fn scenario_breaker_config() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 3,
        failure_window_secs: 60,
        open_timeout_secs: 30,
        half_open_success_threshold: 2,
        exponential_backoff: true,
        backoff_multiplier: 2.0,
        max_backoff_secs: 120,
    }
}

/// Prediction backend driven by the test.
///
/// Every job reports `pending` for `pending_polls` polls, then succeeds
/// with `output`. Submissions fail while `set_failing(true)`.
pub struct ScriptedBackend {
    pending_polls: u32,
    output: Vec<String>,
    failing: AtomicBool,
    submit_delay: Duration,
    submits: AtomicU32,
    polls: AtomicU32,
    jobs: Mutex<HashMap<String, u32>>,
}

impl ScriptedBackend {
    pub fn new(pending_polls: u32, output: &str) -> Arc<Self> {
        Self::with_delay(pending_polls, output, Duration::ZERO)
    }

    pub fn with_delay(pending_polls: u32, output: &str, submit_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            pending_polls,
            output: vec![output.to_string()],
            failing: AtomicBool::new(false),
            submit_delay,
            submits: AtomicU32::new(0),
            polls: AtomicU32::new(0),
            jobs: Mutex::new(HashMap::new()),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobBackend for ScriptedBackend {
    type Request = PredictionRequest;
    type Output = Vec<String>;

    async fn submit(&self, _request: &PredictionRequest) -> Result<String, DependencyError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst);
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(DependencyError::Status {
                code: 503,
                body: "upstream overloaded".to_string(),
            });
        }
        let job_id = format!("job-{n}");
        self.jobs.lock().unwrap().insert(job_id.clone(), 0);
        Ok(job_id)
    }

    async fn poll(&self, job_id: &str) -> Result<JobStatus<Vec<String>>, DependencyError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut jobs = self.jobs.lock().unwrap();
        let seen = jobs
            .get_mut(job_id)
            .ok_or_else(|| DependencyError::Status {
                code: 404,
                body: format!("no job {job_id}"),
            })?;
        if *seen < self.pending_polls {
            *seen += 1;
            Ok(JobStatus::Pending)
        } else {
            Ok(JobStatus::Succeeded(self.output.clone()))
        }
    }
}

/// Protected caller over `backend` with the given poll settings.
pub fn protected(
    breaker: Arc<CircuitBreaker>,
    backend: &Arc<ScriptedBackend>,
    poll: PollSettings,
) -> ProtectedCaller<PredictionRequest, Vec<String>> {
    let backend: Arc<dyn JobBackend<Request = PredictionRequest, Output = Vec<String>>> =
        backend.clone();
    ProtectedCaller::new(breaker, backend, poll)
}

pub fn prediction(prompt: &str) -> PredictionRequest {
    PredictionRequest {
        model: "test-model".to_string(),
        prompt: prompt.to_string(),
        width: 1024,
        height: 1024,
    }
}

/// Serve `state` on an ephemeral local port.
pub async fn start_server(state: AppState) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(state, Duration::from_secs(10));
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    (addr, shutdown)
}
