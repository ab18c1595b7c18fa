//! Request Cache - TTL response caching for REST API clients
//!
//! Caches backend responses under a key derived from the endpoint and its
//! parameters, and debounces bursts of requests to the same endpoint so only
//! the latest one reaches the network.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;
pub mod upstream;

pub use api::AppState;
pub use cache::{derive_key, CacheKey, DebounceGate, RequestCache};
pub use config::Config;
pub use error::CacheError;
pub use tasks::spawn_sweep_task;
pub use upstream::ApiClient;
