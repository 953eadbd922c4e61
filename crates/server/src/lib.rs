//! HTTP server and upload coordination for Folio.
//!
//! This crate provides:
//! - The upload coordinator (version assignment, split-phase commit, retention)
//! - Per-document lock registry
//! - Document upload, history and download endpoints
//! - Prometheus metrics

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod versioning;

pub use error::ApiError;
pub use routes::{create_router, serve};
pub use state::AppState;
pub use versioning::{UploadCoordinator, VersioningError};
