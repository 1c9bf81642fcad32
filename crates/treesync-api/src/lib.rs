//! # treesync API
//!
//! HTTP/JSON surface over the scheduler.
//!
//! ```text
//! /jobs
//!   GET    /jobs              - List jobs
//!   POST   /jobs              - Create job
//!   GET    /jobs/{id}         - Get job
//!   PUT    /jobs/{id}         - Replace job definition
//!   DELETE /jobs/{id}         - Delete job
//!   POST   /jobs/{id}/toggle  - Enable/disable
//!   POST   /jobs/{id}/run     - Run now (synchronous)
//!
//! /health                     - Liveness with job and timer counts
//! ```

pub mod error;
pub mod health;
pub mod jobs;
pub mod routes;
pub mod server;
pub mod state;

#[cfg(test)]
mod test_support;

pub use error::ApiError;
pub use routes::create_router;
pub use server::{ApiConfig, ApiServer};
pub use state::AppState;
