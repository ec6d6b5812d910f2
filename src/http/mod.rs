//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Axum router with the batch preparation endpoints
//! - Request handlers for manifests, PCM parts and multipart bodies
//! - Prepared batch cache with TTL and memory limits
//! - CORS and request tracing middleware

pub mod cache;
pub mod handlers;
pub mod routes;

pub use routes::create_router;
