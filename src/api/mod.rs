//! API Module
//!
//! HTTP handlers and routing for the caching proxy.
//!
//! # Endpoints
//! - `GET /api/*path` - Cached backend response
//! - `POST /cache/invalidate` - Drop cached responses for an endpoint
//! - `DELETE /cache` - Drop every cached response
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
