//! Upstream Module
//!
//! HTTP client for the REST backend whose responses are cached.

mod client;

pub use client::ApiClient;
