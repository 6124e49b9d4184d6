//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls short-circuit to the fallback
//! - Half-Open: calls are attempted to test whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: open_timeout elapsed since the last failure
//! Half-Open → Closed: half_open_probe_count successful probes
//! Half-Open → Open: any probe fails
//! ```
//!
//! # Design Decisions
//! - One breaker per named dependency, never global
//! - Bookkeeping under a std mutex that is never held across an await
//! - Executed-and-failed calls return their error; only short-circuited
//!   calls use the fallback

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::error::CircuitOpenError;
use crate::observability::metrics;

/// Current circuit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding: 0 closed, 1 open, 2 half-open.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    failure_count: u32,
    half_open_success_count: u32,
    last_failure: Option<Instant>,
}

/// Point-in-time view of a breaker, served by the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub dependency: String,
    pub enabled: bool,
    pub state: CircuitState,
    pub failure_count: u32,
    pub half_open_success_count: u32,
    pub failure_threshold: u32,
    pub half_open_probe_count: u32,
    pub open_timeout_secs: u64,
    pub seconds_since_last_failure: Option<f64>,
}

enum Admission {
    Proceed,
    Reject,
}

/// Per-dependency circuit breaker.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        metrics::record_circuit_state(&name, CircuitState::Closed.as_gauge());
        Self {
            name,
            config,
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                failure_count: 0,
                half_open_success_count: 0,
                last_failure: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, without applying any pending time-based transition.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("circuit breaker mutex poisoned").state
    }

    /// Run `operation` through the breaker; short-circuits with `CircuitOpenError`.
    pub async fn call<T, E, Fut>(&self, operation: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError>,
    {
        if !self.config.enabled {
            return operation.await;
        }

        match self.admit() {
            Admission::Reject => Err(E::from(CircuitOpenError {
                dependency: self.name.clone(),
            })),
            Admission::Proceed => self.observe(operation.await),
        }
    }

    /// Run `operation` through the breaker; short-circuits to `fallback`.
    ///
    /// The fallback's value is returned as success. It is not used when the
    /// operation runs and fails.
    pub async fn call_with_fallback<T, E, Fut, F, FbFut>(
        &self,
        operation: Fut,
        fallback: F,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        F: FnOnce() -> FbFut,
        FbFut: Future<Output = T>,
    {
        if !self.config.enabled {
            return operation.await;
        }

        match self.admit() {
            Admission::Reject => {
                tracing::debug!(dependency = %self.name, "Circuit open, using fallback");
                Ok(fallback().await)
            }
            Admission::Proceed => self.observe(operation.await),
        }
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        CircuitSnapshot {
            dependency: self.name.clone(),
            enabled: self.config.enabled,
            state: inner.state,
            failure_count: inner.failure_count,
            half_open_success_count: inner.half_open_success_count,
            failure_threshold: self.config.failure_threshold,
            half_open_probe_count: self.config.half_open_probe_count,
            open_timeout_secs: self.config.open_timeout_secs,
            seconds_since_last_failure: inner
                .last_failure
                .map(|at| at.elapsed().as_secs_f64()),
        }
    }

    fn admit(&self) -> Admission {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        let now = Instant::now();

        if inner.state == CircuitState::Open && self.open_timeout_elapsed(&inner, now) {
            self.transition(&mut inner, CircuitState::HalfOpen);
            inner.half_open_success_count = 0;
        }

        if inner.state == CircuitState::HalfOpen
            && inner.half_open_success_count >= self.config.half_open_probe_count
        {
            self.transition(&mut inner, CircuitState::Closed);
            inner.failure_count = 0;
        }

        if inner.state == CircuitState::Open {
            Admission::Reject
        } else {
            Admission::Proceed
        }
    }

    fn open_timeout_elapsed(&self, inner: &CircuitInner, now: Instant) -> bool {
        match inner.last_failure {
            Some(at) => now.saturating_duration_since(at) >= self.open_timeout(),
            None => true,
        }
    }

    fn open_timeout(&self) -> Duration {
        self.config.open_timeout()
    }

    fn observe<T, E>(&self, result: Result<T, E>) -> Result<T, E> {
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        match inner.state {
            CircuitState::HalfOpen => inner.half_open_success_count += 1,
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::Open => {}
        }
        metrics::record_circuit_call(&self.name, true);
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                self.transition(&mut inner, CircuitState::Open);
                inner.half_open_success_count = 0;
            }
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                self.transition(&mut inner, CircuitState::Open);
            }
            _ => {}
        }
        metrics::record_circuit_call(&self.name, false);
    }

    fn transition(&self, inner: &mut CircuitInner, to: CircuitState) {
        if inner.state == to {
            return;
        }
        let from = inner.state;
        inner.state = to;

        match to {
            CircuitState::Open => tracing::warn!(
                dependency = %self.name,
                from = from.as_str(),
                failure_count = inner.failure_count,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(
                dependency = %self.name,
                from = from.as_str(),
                to = to.as_str(),
                "Circuit breaker state changed"
            ),
        }
        metrics::record_circuit_state(&self.name, to.as_gauge());
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
