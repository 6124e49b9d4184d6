//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (payload validation, request ID, idempotency key)
//!     → handlers.rs (hand off to the orchestrator)
//!     → response.rs (success body or error envelope)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{X_IDEMPOTENCY_KEY, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
