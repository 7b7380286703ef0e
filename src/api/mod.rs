//! HTTP API: task submission, status, health, and service metadata.

mod error;
mod routes;
pub mod types;

pub use error::ApiError;
pub use routes::{router, serve, AppState};
