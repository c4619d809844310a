//! Circuit breaker for unreliable dependencies.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: probing whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures in window >= failure_threshold
//! Open → Half-Open: current backoff elapsed (checked on the next call)
//! Half-Open → Closed: half_open_success_threshold consecutive successes
//! Half-Open → Open: any failure (recomputed, larger backoff)
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency, shared by `Arc` across every caller
//! - State and metrics live behind a single std `Mutex`; the guard is never
//!   held across an `.await`, so the protected call runs outside the lock
//! - Rejections never reach the success/failure path and never touch the window
//! - Time is read from `tokio::time::Instant` so paused-clock tests are exact

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

pub use crate::config::schema::BreakerConfig;
use crate::observability::metrics;
use crate::resilience::backoff::trip_backoff;

/// Smoothing factor of the latency moving average.
const LATENCY_ALPHA: f64 = 0.1;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(name)
    }
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// The breaker is open; the operation was not attempted.
    #[error("circuit '{breaker}' is open, retry in {retry_in:?}")]
    Open { breaker: String, retry_in: Duration },

    /// The operation ran and failed.
    #[error("{0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }
}

/// Counters owned by a single breaker.
#[derive(Debug, Clone, Default)]
pub struct BreakerMetrics {
    pub total_calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub rejected: u64,
    pub trips: u64,
    pub last_failure_at: Option<SystemTime>,
    pub last_trip_at: Option<SystemTime>,
    pub last_recovery_at: Option<SystemTime>,
    /// Exponential moving average of successful call latency.
    pub average_latency: Duration,
}

impl BreakerMetrics {
    fn record_latency(&mut self, latency: Duration) {
        if self.successes <= 1 {
            self.average_latency = latency;
            return;
        }
        let smoothed = LATENCY_ALPHA * latency.as_secs_f64()
            + (1.0 - LATENCY_ALPHA) * self.average_latency.as_secs_f64();
        self.average_latency = Duration::from_secs_f64(smoothed);
    }

    /// Failures over admitted calls, `0.0` before the first call.
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.failures as f64 / self.total_calls as f64
        }
    }
}

/// Read-only snapshot for monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub time_in_state_secs: f64,
    pub total_calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub rejected: u64,
    pub failure_rate: f64,
    pub trips: u64,
    pub current_backoff_secs: f64,
    pub average_latency_secs: f64,
    pub last_failure_at: Option<u64>,
    pub last_trip_at: Option<u64>,
    pub last_recovery_at: Option<u64>,
}

/// Mutable state, only touched while the breaker's lock is held.
#[derive(Debug)]
struct Inner {
    state: CircuitState,
    state_changed_at: Instant,
    recent_failures: VecDeque<Instant>,
    half_open_successes: u32,
    /// Trips since the breaker last closed.
    consecutive_trips: u32,
    current_backoff: Duration,
    metrics: BreakerMetrics,
}

/// Per-dependency circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let name = name.into();
        let inner = Inner {
            state: CircuitState::Closed,
            state_changed_at: Instant::now(),
            recent_failures: VecDeque::new(),
            half_open_successes: 0,
            consecutive_trips: 0,
            current_backoff: config.open_timeout(),
            metrics: BreakerMetrics::default(),
        };

        tracing::info!(
            breaker = %name,
            failure_threshold = config.failure_threshold,
            open_timeout_secs = config.open_timeout_secs,
            "Circuit breaker initialized"
        );
        metrics::record_breaker_state(&name, CircuitState::Closed);

        Self {
            name,
            config,
            inner: Mutex::new(inner),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Run `operation` if the breaker admits it, recording the outcome.
    ///
    /// Returns [`BreakerError::Open`] without calling `operation` while the
    /// breaker is open and its backoff has not elapsed.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.try_acquire()?;

        let started = Instant::now();
        match operation().await {
            Ok(value) => {
                self.on_success(started.elapsed());
                Ok(value)
            }
            Err(e) => {
                self.on_failure(&e);
                Err(BreakerError::Inner(e))
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn current_backoff(&self) -> Duration {
        self.lock().current_backoff
    }

    pub fn metrics(&self) -> BreakerMetrics {
        self.lock().metrics.clone()
    }

    pub fn status(&self) -> BreakerStatus {
        let inner = self.lock();
        let metrics = &inner.metrics;
        BreakerStatus {
            name: self.name.clone(),
            state: inner.state,
            time_in_state_secs: inner.state_changed_at.elapsed().as_secs_f64(),
            total_calls: metrics.total_calls,
            successes: metrics.successes,
            failures: metrics.failures,
            rejected: metrics.rejected,
            failure_rate: metrics.failure_rate(),
            trips: metrics.trips,
            current_backoff_secs: inner.current_backoff.as_secs_f64(),
            average_latency_secs: metrics.average_latency.as_secs_f64(),
            last_failure_at: metrics.last_failure_at.and_then(unix_secs),
            last_trip_at: metrics.last_trip_at.and_then(unix_secs),
            last_recovery_at: metrics.last_recovery_at.and_then(unix_secs),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admission check. Moves Open → Half-Open once the backoff has elapsed.
    fn try_acquire<E>(&self) -> Result<(), BreakerError<E>> {
        let mut inner = self.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let elapsed = inner.state_changed_at.elapsed();
        if elapsed < inner.current_backoff {
            inner.metrics.rejected += 1;
            let retry_in = inner.current_backoff - elapsed;
            drop(inner);

            metrics::record_breaker_rejection(&self.name);
            tracing::debug!(breaker = %self.name, retry_in = ?retry_in, "Call rejected, circuit open");
            return Err(BreakerError::Open {
                breaker: self.name.clone(),
                retry_in,
            });
        }

        self.transition(&mut inner, CircuitState::HalfOpen);
        Ok(())
    }

    fn on_success(&self, latency: Duration) {
        let mut inner = self.lock();
        inner.metrics.total_calls += 1;
        inner.metrics.successes += 1;
        inner.metrics.record_latency(latency);

        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_success_threshold {
                    self.close(&mut inner);
                }
            }
            CircuitState::Closed => self.prune(&mut inner),
            CircuitState::Open => {}
        }
        drop(inner);

        metrics::record_breaker_call(&self.name, true);
    }

    fn on_failure<E: fmt::Display>(&self, error: &E) {
        let mut inner = self.lock();
        let now = Instant::now();
        inner.metrics.total_calls += 1;
        inner.metrics.failures += 1;
        inner.metrics.last_failure_at = Some(SystemTime::now());
        inner.recent_failures.push_back(now);
        self.prune(&mut inner);

        match inner.state {
            CircuitState::Closed => {
                if inner.recent_failures.len() >= self.config.failure_threshold as usize {
                    self.trip(&mut inner);
                }
            }
            CircuitState::HalfOpen => self.trip(&mut inner),
            CircuitState::Open => {}
        }
        drop(inner);

        metrics::record_breaker_call(&self.name, false);
        tracing::debug!(breaker = %self.name, error = %error, "Protected call failed");
    }

    /// Drop failures with `now - t >= window`.
    fn prune(&self, inner: &mut Inner) {
        let window = self.config.failure_window();
        let now = Instant::now();
        while let Some(&oldest) = inner.recent_failures.front() {
            if now.duration_since(oldest) >= window {
                inner.recent_failures.pop_front();
            } else {
                break;
            }
        }
    }

    fn trip(&self, inner: &mut Inner) {
        inner.current_backoff = if self.config.exponential_backoff {
            trip_backoff(
                inner.consecutive_trips,
                self.config.open_timeout(),
                self.config.backoff_multiplier,
                self.config.max_backoff(),
            )
        } else {
            self.config.open_timeout()
        };
        inner.consecutive_trips = inner.consecutive_trips.saturating_add(1);
        inner.metrics.trips += 1;
        inner.metrics.last_trip_at = Some(SystemTime::now());

        tracing::warn!(
            breaker = %self.name,
            from = %inner.state,
            backoff = ?inner.current_backoff,
            recent_failures = inner.recent_failures.len(),
            "Circuit breaker tripped"
        );
        metrics::record_breaker_trip(&self.name);
        self.transition(inner, CircuitState::Open);
    }

    fn close(&self, inner: &mut Inner) {
        inner.consecutive_trips = 0;
        inner.current_backoff = self.config.open_timeout();
        inner.recent_failures.clear();
        inner.metrics.last_recovery_at = Some(SystemTime::now());
        self.transition(inner, CircuitState::Closed);
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.state_changed_at = Instant::now();
        inner.half_open_successes = 0;

        tracing::info!(breaker = %self.name, from = %from, to = %to, "Circuit state changed");
        metrics::record_breaker_state(&self.name, to);
    }
}

fn unix_secs(at: SystemTime) -> Option<u64> {
    at.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            failure_window_secs: 60,
            open_timeout_secs: 30,
            half_open_success_threshold: 2,
            exponential_backoff: true,
            backoff_multiplier: 2.0,
            max_backoff_secs: 100,
        }
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        breaker.execute(|| async { Err::<(), _>("boom") }).await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        breaker.execute(|| async { Ok::<_, &str>(()) }).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_trips_at_threshold() {
        let breaker = CircuitBreaker::new("test", config());
        fail(&breaker).await.unwrap_err();
        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.state(), CircuitState::Closed);

        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.metrics().trips, 1);
        assert_eq!(breaker.current_backoff(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_without_calling() {
        let breaker = CircuitBreaker::new("test", config());
        for _ in 0..3 {
            fail(&breaker).await.unwrap_err();
        }

        let mut called = false;
        let result = breaker
            .execute(|| {
                called = true;
                async { Ok::<_, &str>(()) }
            })
            .await;

        assert!(!called);
        match result {
            Err(BreakerError::Open { retry_in, .. }) => {
                assert_eq!(retry_in, Duration::from_secs(30))
            }
            other => panic!("expected open, got {other:?}"),
        }
        let metrics = breaker.metrics();
        assert_eq!(metrics.rejected, 1);
        assert_eq!(metrics.total_calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_outside_window_are_forgotten() {
        let breaker = CircuitBreaker::new("test", config());
        fail(&breaker).await.unwrap_err();
        fail(&breaker).await.unwrap_err();

        advance(Duration::from_secs(60)).await;
        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_with_larger_backoff() {
        let breaker = CircuitBreaker::new("test", config());
        for _ in 0..3 {
            fail(&breaker).await.unwrap_err();
        }

        advance(Duration::from_secs(30)).await;
        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.current_backoff(), Duration::from_secs(60));

        advance(Duration::from_secs(60)).await;
        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.current_backoff(), Duration::from_secs(100));
        assert_eq!(breaker.metrics().trips, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_successes_close_and_reset_backoff() {
        let breaker = CircuitBreaker::new("test", config());
        for _ in 0..3 {
            fail(&breaker).await.unwrap_err();
        }
        advance(Duration::from_secs(30)).await;
        fail(&breaker).await.unwrap_err();
        advance(Duration::from_secs(60)).await;

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.current_backoff(), Duration::from_secs(30));

        let status = breaker.status();
        assert!(status.last_recovery_at.is_some());
        assert_eq!(status.trips, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_backoff_when_exponential_disabled() {
        let breaker = CircuitBreaker::new(
            "test",
            BreakerConfig {
                exponential_backoff: false,
                ..config()
            },
        );
        for _ in 0..3 {
            fail(&breaker).await.unwrap_err();
        }
        advance(Duration::from_secs(30)).await;
        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.current_backoff(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_average_and_status() {
        let breaker = CircuitBreaker::new("test", config());
        breaker
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, &str>(())
            })
            .await
            .unwrap();
        breaker
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok::<_, &str>(())
            })
            .await
            .unwrap();
        fail(&breaker).await.unwrap_err();

        let status = breaker.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.total_calls, 3);
        assert_eq!(status.successes, 2);
        assert_eq!(status.failures, 1);
        assert!((status.failure_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((status.average_latency_secs - 1.1).abs() < 1e-6);
        assert!(status.last_failure_at.is_some());
        assert!(status.last_trip_at.is_none());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&CircuitState::HalfOpen).unwrap();
        assert_eq!(json, "\"half_open\"");
    }
}
