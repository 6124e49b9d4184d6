//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Connect stores → Load model → Wire adapters → Start flusher
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Flush buffer → Close stores
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then stores, then model, then listeners
//! - Ordered shutdown: stop accept, drain, flush, close
//! - Shutdown has timeout: in-flight requests are abandoned after the deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{teardown, Shutdown};
pub use startup::Services;
