//! Audit logging subsystem.
//!
//! # Data Flow
//! ```text
//! RequestOrchestrator
//!     → record.rs (one AuditRecord per request)
//!     → logger.rs (breaker → retry → LogStore)
//!         → on failure: buffer.rs (bounded FIFO)
//!     → flusher task / admin flush / shutdown replays the buffer
//! ```

pub mod buffer;
pub mod logger;
pub mod record;

pub use buffer::{BufferSnapshot, FallbackBuffer};
pub use logger::{DurableLogger, LogOutcome};
pub use record::AuditRecord;
