//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a dependency:
//!     → circuit_breaker.rs (short-circuit to fallback while open)
//!     → retries.rs (retry transient failures with backoff)
//!     → timeouts.rs (deadline on every attempt)
//!     → store / model call
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Only failures marked `Retryable` are retried
//! - One breaker per named dependency, shared by every adapter using it

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};
pub use retries::{RetryAttempt, RetryExecutor, RetryPolicy, Retryable};
