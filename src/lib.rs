//! Resilient text-classification inference server.

pub mod admin;
pub mod audit;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod inference;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod storage;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::{Services, Shutdown};
