//! # API Shared
//!
//! Definitions shared by the HealthRecord processing service and its clients.
//!
//! Contains:
//! - Wire types for the processing endpoint (`wire` module)
//! - Shared services like `HealthService`
//! - API key checking (usable by the REST service and by tests)
//!
//! Used by `healthrec-core` (client side) and `api-rest` (server side).

pub mod auth;
pub mod health;
pub mod wire;

pub use health::HealthService;
pub use wire::*;
