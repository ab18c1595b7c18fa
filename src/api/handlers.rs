//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::cache::RequestCache;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, HealthResponse, InvalidateRequest, InvalidateResponse, StatsResponse,
};
use crate::upstream::ApiClient;

/// Request header overriding the cache TTL, in milliseconds
pub const TTL_HEADER: &str = "x-cache-ttl-ms";
/// Request header overriding the debounce window, in milliseconds (0 disables)
///
/// The window is shared by every client of an endpoint, whatever its query.
/// A request arriving inside the window supersedes a pending one from any
/// other client, and the earlier request is answered with `409 Conflict`.
/// Only set this for traffic from a single client, such as search-as-you-type.
pub const DEBOUNCE_HEADER: &str = "x-debounce-ms";
/// Response header reporting whether the body came from the cache
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache");

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared response cache
    pub cache: RequestCache<Value>,
    /// Backend client used on cache misses
    pub client: ApiClient,
    /// TTL applied when the request does not override it
    pub default_ttl: Duration,
    /// Debounce window applied when the request does not override it
    pub default_debounce: Option<Duration>,
}

impl AppState {
    pub fn new(
        client: ApiClient,
        default_ttl: Duration,
        default_debounce: Option<Duration>,
    ) -> Self {
        Self {
            cache: RequestCache::new(),
            client,
            default_ttl,
            default_debounce,
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ApiClient::new(config.upstream_url.clone(), config.request_timeout())?;
        Ok(Self::new(
            client,
            config.default_ttl(),
            config.default_debounce(),
        ))
    }
}

/// Handler for GET /api/*path
///
/// Serves the backend response for `/api/{path}` from the cache, fetching it
/// upstream on a miss. Query pairs form the params object of the cache key.
///
/// Debouncing (see [`DEBOUNCE_HEADER`]) is keyed by endpoint alone, so a
/// debounced request can be superseded by another client's request.
pub async fn proxy_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response> {
    let endpoint = format!("/api/{}", path.trim_start_matches('/'));
    let params = query_params(query);

    let ttl = header_millis(&headers, TTL_HEADER)?.unwrap_or(state.default_ttl);
    let debounce = match header_millis(&headers, DEBOUNCE_HEADER)? {
        Some(window) if window.is_zero() => None,
        Some(window) => Some(window),
        None => state.default_debounce,
    };

    let fetched = AtomicBool::new(false);
    let value = state
        .cache
        .cached_request(&endpoint, params.as_ref(), ttl, debounce, || {
            fetched.store(true, Ordering::Relaxed);
            state.client.get_json(&endpoint, params.as_ref())
        })
        .await?;

    let cache_status = if fetched.load(Ordering::Relaxed) {
        "MISS"
    } else {
        "HIT"
    };
    debug!(%endpoint, cache_status, "Proxied request");

    Ok((
        [(CACHE_STATUS_HEADER, HeaderValue::from_static(cache_status))],
        Json(value),
    )
        .into_response())
}

/// Handler for POST /cache/invalidate
///
/// Drops one cached response, or all of an endpoint's responses with `all_params`.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let removed = if req.all_params {
        state.cache.invalidate_endpoint(&req.endpoint).await
    } else {
        usize::from(state.cache.invalidate(&req.endpoint, req.params.as_ref()).await)
    };

    Ok(Json(InvalidateResponse::new(req.endpoint, removed)))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.cache.clear().await;
    Json(ClearResponse::new(removed))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats().await;
    Json(StatsResponse::new(&stats, state.cache.pending_debounces()))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.client.base_url()))
}

/// Groups query pairs into a params object.
///
/// A key given once maps to its string value. A repeated key maps to an array
/// of its values in request order, so `?tag=a&tag=b` keeps both tags.
fn query_params(pairs: Vec<(String, String)>) -> Option<Value> {
    if pairs.is_empty() {
        return None;
    }

    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in pairs {
        grouped.entry(key).or_default().push(value);
    }

    let params = grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                Value::String(values.remove(0))
            } else {
                Value::Array(values.into_iter().map(Value::String).collect())
            };
            (key, value)
        })
        .collect::<Map<String, Value>>();
    Some(Value::Object(params))
}

/// Reads a millisecond duration from `name`, rejecting non-numeric values.
fn header_millis(headers: &HeaderMap, name: &str) -> Result<Option<Duration>> {
    let Some(raw) = headers.get(name) else {
        return Ok(None);
    };

    raw.to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|ms| Some(Duration::from_millis(ms)))
        .ok_or_else(|| {
            CacheError::InvalidRequest(format!("{name} must be a whole number of milliseconds"))
        })
}
