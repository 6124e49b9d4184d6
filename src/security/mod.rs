//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → RequestBodyLimitLayer (reject oversized bodies)
//!     → rate_limit.rs (check per-IP limits, `/infer` only)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Rate limiting is opt-in and keyed by peer IP
//! - Admin routes are guarded separately by bearer token (`admin::auth`)

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimiterState};
