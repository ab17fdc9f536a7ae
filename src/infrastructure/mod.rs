//! Infrastructure layer module
//!
//! Adapters and ambient plumbing:
//! - Prometheus HTTP client
//! - Configuration management
//! - Logging infrastructure
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod logging;
pub mod prometheus;
