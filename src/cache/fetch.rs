//! Cached Fetch Module
//!
//! The read path callers use: consult the store, and on a miss run the supplied
//! fetch (optionally behind the debounce gate) and remember its result.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{derive_key, CacheStats, CacheStore, DebounceGate};
use crate::error::CacheError;

// == Request Cache ==
/// Shared handle to a response cache and its debounce timers.
///
/// Cloning is cheap and every clone sees the same state, so one instance can be
/// handed to every call site of an API client.
pub struct RequestCache<V> {
    store: Arc<RwLock<CacheStore<V>>>,
    debounce: Arc<DebounceGate>,
}

impl<V> Clone for RequestCache<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            debounce: Arc::clone(&self.debounce),
        }
    }
}

impl<V: Clone> Default for RequestCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> RequestCache<V> {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(CacheStore::new())),
            debounce: Arc::new(DebounceGate::new()),
        }
    }

    // == Cached Request ==
    /// Returns the cached value for `endpoint` + `params`, fetching it on a miss.
    ///
    /// A fresh entry is returned without calling `fetch`. Otherwise, when
    /// `debounce` is set the call first waits out the debounce window for
    /// `endpoint`; if a newer call for the same endpoint arrives during the
    /// window, this one yields [`CacheError::Superseded`] and its `fetch` never
    /// runs. A successful fetch is stored for `ttl`. A failed fetch is returned
    /// unchanged and nothing is stored.
    ///
    /// Concurrent misses for the same key are not merged: each one fetches.
    pub async fn cached_request<F, Fut, E>(
        &self,
        endpoint: &str,
        params: Option<&Value>,
        ttl: Duration,
        debounce: Option<Duration>,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<CacheError>,
    {
        let key = derive_key(endpoint, params);

        let cached = self.store.write().await.get(key.as_str());
        if let Some(value) = cached {
            debug!(%key, "Cache hit");
            return Ok(value);
        }
        debug!(%key, "Cache miss");

        // Debounce per endpoint so bursts with changing params collapse too
        let outcome = match debounce {
            Some(delay) => match self.debounce.schedule(endpoint, delay, fetch).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.store.write().await.stats_mut().record_superseded();
                    return Err(err.into());
                }
            },
            None => fetch().await,
        };

        let mut store = self.store.write().await;
        match outcome {
            Ok(value) => {
                store.set(key, value.clone(), ttl);
                store.stats_mut().record_fetch();
                Ok(value)
            }
            Err(err) => {
                warn!(%key, "Fetch failed, nothing cached");
                store.stats_mut().record_fetch_failure();
                Err(err)
            }
        }
    }

    // == Peek ==
    /// Returns the fresh cached value for `endpoint` + `params`, if any,
    /// without fetching or counting a lookup.
    pub async fn get(&self, endpoint: &str, params: Option<&Value>) -> Option<V> {
        let key = derive_key(endpoint, params);
        self.store
            .read()
            .await
            .peek(key.as_str())
            .map(|entry| entry.value.clone())
    }

    // == Invalidate ==
    /// Drops the entry for exactly `endpoint` + `params`.
    pub async fn invalidate(&self, endpoint: &str, params: Option<&Value>) -> bool {
        let key = derive_key(endpoint, params);
        self.store.write().await.remove(key.as_str())
    }

    /// Drops every entry cached for `endpoint`, whatever its params.
    ///
    /// Other endpoints sharing a text prefix keep their entries.
    pub async fn invalidate_endpoint(&self, endpoint: &str) -> usize {
        self.store.write().await.remove_endpoint(endpoint)
    }

    /// Drops every entry.
    pub async fn clear(&self) -> usize {
        self.store.write().await.clear()
    }

    /// Removes stale entries ahead of their next read.
    pub async fn purge_expired(&self) -> usize {
        self.store.write().await.purge_expired()
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    /// Number of endpoints with a debounced call waiting to fire.
    pub fn pending_debounces(&self) -> usize {
        self.debounce.pending_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MINUTE: Duration = Duration::from_secs(60);

    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        value: Value,
    ) -> impl FnOnce() -> std::future::Ready<Result<Value, CacheError>> {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(value))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_within_ttl_skips_fetch() {
        let cache = RequestCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let params = json!({"sort": "latest"});

        for _ in 0..2 {
            let value = cache
                .cached_request(
                    "/api/tasks",
                    Some(&params),
                    MINUTE,
                    None,
                    counting_fetch(&calls, json!(["task-1"])),
                )
                .await
                .unwrap();
            assert_eq!(value, json!(["task-1"]));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.fetches, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reordered_params_hit_same_entry() {
        let cache = RequestCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .cached_request(
                "/api/flea-market",
                Some(&json!({"page": 1, "category": "books"})),
                MINUTE,
                None,
                counting_fetch(&calls, json!({"items": []})),
            )
            .await
            .unwrap();

        let mut reordered = serde_json::Map::new();
        reordered.insert("category".into(), json!("books"));
        reordered.insert("page".into(), json!(1));
        cache
            .cached_request(
                "/api/flea-market",
                Some(&Value::Object(reordered)),
                MINUTE,
                None,
                counting_fetch(&calls, json!({"items": []})),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_refetched() {
        let cache = RequestCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Duration::from_millis(500);

        cache
            .cached_request("/api/leaderboard", None, ttl, None, counting_fetch(&calls, json!(1)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_millis(501)).await;

        let value = cache
            .cached_request("/api/leaderboard", None, ttl, None, counting_fetch(&calls, json!(2)))
            .await
            .unwrap();

        assert_eq!(value, json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().await.expired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_is_not_cached() {
        let cache: RequestCache<Value> = RequestCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err::<Value, _>(CacheError::Upstream("503".into())))
            }
        };
        let result = cache
            .cached_request("/api/tasks", None, MINUTE, None, failing)
            .await;
        assert!(matches!(result, Err(CacheError::Upstream(msg)) if msg == "503"));
        assert!(cache.get("/api/tasks", None).await.is_none());

        // Same key again still reaches the fetch
        cache
            .cached_request("/api/tasks", None, MINUTE, None, counting_fetch(&calls, json!([])))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let stats = cache.stats().await;
        assert_eq!(stats.fetch_failures, 1);
        assert_eq!(stats.fetches, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_error_type_passes_through() {
        #[derive(Debug, PartialEq)]
        enum ClientError {
            Offline,
            Cache(String),
        }

        impl From<CacheError> for ClientError {
            fn from(err: CacheError) -> Self {
                ClientError::Cache(err.to_string())
            }
        }

        let cache: RequestCache<u32> = RequestCache::new();
        let result = cache
            .cached_request("/api/vip", None, MINUTE, None, || async {
                Err(ClientError::Offline)
            })
            .await;

        assert_eq!(result, Err(ClientError::Offline));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_burst_fetches_once_with_latest_params() {
        let cache = RequestCache::new();
        let fetched: Arc<std::sync::Mutex<Vec<String>>> = Arc::default();
        let debounce = Some(Duration::from_millis(300));

        let mut handles = Vec::new();
        for query in ["l", "lo", "lon"] {
            let cache = cache.clone();
            let fetched = fetched.clone();
            handles.push(tokio::spawn(async move {
                let params = json!({ "q": query });
                cache
                    .cached_request("/api/search", Some(&params), MINUTE, debounce, move || async move {
                        fetched.lock().unwrap().push(query.to_string());
                        Ok::<_, CacheError>(json!([query]))
                    })
                    .await
            }));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        assert!(matches!(outcomes[0], Err(CacheError::Superseded(_))));
        assert!(matches!(outcomes[1], Err(CacheError::Superseded(_))));
        assert_eq!(outcomes[2].as_ref().unwrap(), &json!(["lon"]));
        assert_eq!(*fetched.lock().unwrap(), vec!["lon".to_string()]);

        let stats = cache.stats().await;
        assert_eq!(stats.superseded, 2);
        assert_eq!(stats.fetches, 1);
        assert_eq!(cache.pending_debounces(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_skipped_on_hit() {
        let cache = RequestCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let debounce = Some(Duration::from_millis(300));

        cache
            .cached_request("/api/tasks", None, MINUTE, debounce, counting_fetch(&calls, json!(1)))
            .await
            .unwrap();

        let started = tokio::time::Instant::now();
        cache
            .cached_request("/api/tasks", None, MINUTE, debounce, counting_fetch(&calls, json!(2)))
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_each_fetch() {
        let cache = RequestCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let slow_fetch = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, CacheError>(json!("tasks"))
            }
        };

        let (a, b) = tokio::join!(
            cache.cached_request("/api/tasks", None, MINUTE, None, slow_fetch(calls.clone())),
            cache.cached_request("/api/tasks", None, MINUTE, None, slow_fetch(calls.clone())),
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().await.total_entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation() {
        let cache = RequestCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let page1 = json!({"page": 1});
        let page2 = json!({"page": 2});

        for params in [&page1, &page2] {
            cache
                .cached_request("/api/forums", Some(params), MINUTE, None, counting_fetch(&calls, json!([])))
                .await
                .unwrap();
        }
        cache
            .cached_request("/api/tasks", None, MINUTE, None, counting_fetch(&calls, json!([])))
            .await
            .unwrap();

        assert!(cache.invalidate("/api/forums", Some(&page1)).await);
        assert!(!cache.invalidate("/api/forums", Some(&page1)).await);
        assert_eq!(cache.invalidate_endpoint("/api/forums").await, 1);
        assert_eq!(cache.clear().await, 1);
        assert_eq!(cache.stats().await.total_entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_endpoint_spares_sibling_endpoints() {
        let cache = RequestCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for endpoint in ["/api/tasks", "/api/tasks/42", "/api/tasks-archive"] {
            cache
                .cached_request(endpoint, None, MINUTE, None, counting_fetch(&calls, json!(endpoint)))
                .await
                .unwrap();
        }

        assert_eq!(cache.invalidate_endpoint("/api/tasks").await, 1);
        assert_eq!(cache.get("/api/tasks", None).await, None);
        assert_eq!(cache.get("/api/tasks/42", None).await, Some(json!("/api/tasks/42")));
        assert_eq!(
            cache.get("/api/tasks-archive", None).await,
            Some(json!("/api/tasks-archive"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_state() {
        let cache = RequestCache::new();
        let clone = cache.clone();
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .cached_request("/api/vip", None, MINUTE, None, counting_fetch(&calls, json!("gold")))
            .await
            .unwrap();

        assert_eq!(clone.get("/api/vip", None).await, Some(json!("gold")));
    }
}
