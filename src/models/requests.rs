//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

/// Request body for POST /cache/invalidate
///
/// # Fields
/// - `endpoint`: Endpoint path whose cached response should be dropped
/// - `params`: Parameters of the exact entry to drop
/// - `all_params`: Drop every entry for exactly this endpoint regardless of
///   params (also accepted as `prefix`). Other endpoints under the same path,
///   such as `/api/tasks/42` for `/api/tasks`, are not touched.
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    pub endpoint: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default, alias = "prefix")]
    pub all_params: bool,
}

impl InvalidateRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.endpoint.is_empty() {
            return Some("Endpoint cannot be empty".to_string());
        }
        if !self.endpoint.starts_with('/') {
            return Some("Endpoint must start with '/'".to_string());
        }
        if self.all_params && self.params.as_ref().is_some_and(|p| !p.is_null()) {
            return Some("Endpoint-wide invalidation does not take params".to_string());
        }
        None
    }
}
