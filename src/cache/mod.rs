//! Cache Module
//!
//! TTL response caching with per-endpoint debouncing for REST API calls.

mod debounce;
mod entry;
mod fetch;
mod key;
mod stats;
mod store;


// Re-export public types
pub use debounce::DebounceGate;
pub use entry::CacheEntry;
pub use fetch::RequestCache;
pub use key::{canonical_json, derive_key, CacheKey};
pub use stats::CacheStats;
pub use store::CacheStore;
