use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::Response,
};
use billboard_core::AppConfig;
use subtle::{Choice, ConstantTimeEq};
use uuid::Uuid;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Whether the caller presented a valid admin bearer token. Stored as a
/// request extension by [`identify_admin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elevated(pub bool);

/// Admin API keys. Admin callers may preview unpublished billboards; every
/// other route is public.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<Vec<String>>,
}

impl AuthState {
    /// Builds auth state from the configured admin keys.
    ///
    /// Config loading already refuses an empty key list outside development.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        if config.admin_api_keys.is_empty() {
            tracing::warn!("no admin API keys configured; test billboard previews disabled");
        }
        Self::from_keys(config.admin_api_keys.iter().cloned())
    }

    #[must_use]
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            api_keys: Arc::new(keys.into_iter().map(Into::into).collect()),
        }
    }

    /// Compares against every key in constant time per key.
    fn allows(&self, token: &str) -> bool {
        let matched = self
            .api_keys
            .iter()
            .fold(Choice::from(0), |acc, key| {
                acc | key.as_bytes().ct_eq(token.as_bytes())
            });
        matched.into()
    }
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware marking the request [`Elevated`] when it carries a valid admin
/// bearer token. Invalid or missing tokens are not rejected; the request is
/// simply served as a regular viewer.
pub async fn identify_admin(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let elevated = extract_bearer_token(req.headers().get(AUTHORIZATION))
        .is_some_and(|token| auth.allows(token));
    if !elevated && req.headers().contains_key(AUTHORIZATION) {
        tracing::debug!("ignoring unrecognized bearer token");
    }

    req.extensions_mut().insert(Elevated(elevated));
    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_bearer_token_accepts_valid_header() {
        let header = HeaderValue::from_static("Bearer test-token");
        assert_eq!(extract_bearer_token(Some(&header)), Some("test-token"));
    }

    #[test]
    fn extract_bearer_token_rejects_non_bearer_header() {
        let header = HeaderValue::from_static("Basic abc123");
        assert_eq!(extract_bearer_token(Some(&header)), None);
    }

    #[test]
    fn auth_state_allows_only_configured_keys() {
        let auth = AuthState::from_keys(["key-one", "key-two"]);
        assert!(auth.allows("key-one"));
        assert!(auth.allows("key-two"));
        assert!(!auth.allows("key-on"));
        assert!(!auth.allows(""));
    }

    #[test]
    fn auth_state_without_keys_elevates_nobody() {
        let auth = AuthState::from_keys(Vec::<String>::new());
        assert!(!auth.allows(""));
        assert!(!auth.allows("anything"));
    }
}
