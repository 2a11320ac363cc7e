//! HTTP transport for the rally-point matchmaking service
//!
//! This module contains the thin Axum layer over the engine: the API
//! router, the response envelope, and the health/metrics endpoints.

pub mod responses;
pub mod routes;

// Re-export commonly used types
pub use responses::ApiResponse;
pub use routes::{create_router, ApiState};
