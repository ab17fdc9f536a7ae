//! Domain layer for the convergence poller
//!
//! This module contains the query language front end, the per-query models,
//! the backend port and the error taxonomy.

pub mod errors;
pub mod models;
pub mod ports;
pub mod query;

pub use errors::{ErrorClass, PollError, QueryError};
