//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    AdminConfig, CacheConfig, CircuitBreakerConfig, FallbackBufferConfig, IdempotencyConfig,
    KvBackend, KvStoreConfig, ListenerConfig, LogBackend, LogFormat, LogStoreConfig, ModelConfig,
    ObservabilityConfig, RateLimitConfig, RetryConfig, ServerConfig, TimeoutConfig,
};
pub use validation::{validate_config, ConfigViolation};
