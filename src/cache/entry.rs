//! Cache Entry Module
//!
//! Defines the structure for individual cached responses with TTL support.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// A cached value together with its expiry deadline.
///
/// Entries are created after a successful fetch and replaced wholesale on refresh;
/// they are never mutated in place.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Endpoint the value was fetched from, without parameters
    pub endpoint: String,
    /// The stored value
    pub value: V,
    /// When the value was stored
    pub created_at: Instant,
    /// Last instant at which the value is still fresh
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry for `endpoint` that stays fresh for `ttl` from now.
    pub fn new(endpoint: impl Into<String>, value: V, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            endpoint: endpoint.into(),
            value,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is still fresh at exactly `expires_at` and
    /// becomes stale strictly after it.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Same as [`is_expired`](Self::is_expired) against an explicit instant.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    // == Time To Live ==
    /// Returns the remaining freshness, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}
