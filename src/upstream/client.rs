//! API Client
//!
//! Thin JSON GET client over reqwest, plus the cached read path built on it.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::RequestCache;
use crate::error::{CacheError, Result};

/// Client for the backend REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Creates a client for `base_url` whose requests give up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // == Get JSON ==
    /// Issues `GET {base_url}{endpoint}` with `params` as the query string.
    ///
    /// `params` must be a JSON object (or absent). Non-2xx statuses and
    /// non-JSON bodies are reported as [`CacheError::Upstream`].
    pub async fn get_json(&self, endpoint: &str, params: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        let query = query_pairs(params)?;

        debug!(%url, params = query.len(), "Upstream request");
        let response = self.client.get(&url).query(&query).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "Upstream returned an error status");
            return Err(CacheError::Upstream(format!("{endpoint} returned {status}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| CacheError::Upstream(format!("{endpoint} returned invalid JSON: {e}")))
    }

    // == Cached Get ==
    /// [`get_json`](Self::get_json) behind `cache`.
    pub async fn cached_get(
        &self,
        cache: &RequestCache<Value>,
        endpoint: &str,
        params: Option<&Value>,
        ttl: Duration,
        debounce: Option<Duration>,
    ) -> Result<Value> {
        cache
            .cached_request(endpoint, params, ttl, debounce, || {
                self.get_json(endpoint, params)
            })
            .await
    }
}

/// Flattens a params object into query pairs.
///
/// Strings are sent bare and other values as their JSON text. An array member
/// becomes one pair per element, so `{"tag": ["a", "b"]}` is sent as
/// `tag=a&tag=b`. `null` members and elements are skipped.
fn query_pairs(params: Option<&Value>) -> Result<Vec<(String, String)>> {
    let map = match params {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(CacheError::InvalidRequest(format!(
                "Request params must be an object, got {other}"
            )))
        }
    };

    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Array(items) => pairs.extend(
                items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(|item| (key.clone(), query_text(item))),
            ),
            Value::Null => {}
            scalar => pairs.push((key.clone(), query_text(scalar))),
        }
    }
    Ok(pairs)
}

fn query_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
