//! HTTP middleware components: error mapping, client identity extraction.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use clawdhub_registry::RegistryError;

use crate::types::ApiError;

/// Custom error type that implements IntoResponse
pub struct AppError {
    pub code: StatusCode,
    pub error: ApiError,
    /// Present on 429 responses.
    pub retry_after_secs: Option<u64>,
}

impl AppError {
    pub fn new(code: StatusCode, error: ApiError) -> Self {
        Self { code, error, retry_after_secs: None }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, ApiError::not_found(message))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ApiError::bad_request(message))
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ApiError::new("UNAUTHORIZED", "Authentication required"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal(message))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (self.code, Json(self.error)).into_response();
        if let Some(secs) = self.retry_after_secs {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        let (code, api_code) = match &err {
            RegistryError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            RegistryError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            RegistryError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            RegistryError::Gone(_) => (StatusCode::GONE, "GONE"),
            RegistryError::PayloadTooLarge(_) | RegistryError::BundleTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
            }
            RegistryError::UnsupportedFileType { .. } => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FILE_TYPE")
            }
            RegistryError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            RegistryError::Validation(_) | RegistryError::MissingSkillMd => {
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED")
            }
            RegistryError::VersionExists { .. } => (StatusCode::CONFLICT, "VERSION_EXISTS"),
            RegistryError::EmbeddingUnavailable(_) => {
                (StatusCode::BAD_GATEWAY, "EMBEDDING_UNAVAILABLE")
            }
            RegistryError::Storage(_) | RegistryError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        if code == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "internal server error");
        }

        let retry_after_secs = match &err {
            RegistryError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        Self {
            code,
            error: ApiError::new(api_code, err.to_string()),
            retry_after_secs,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "internal server error");
        Self::internal(err.to_string())
    }
}

/// Derive the client IP from proxy headers, first match wins:
/// `cf-connecting-ip`, `x-real-ip`, `x-forwarded-for` (first hop),
/// `fly-client-ip`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    for name in ["cf-connecting-ip", "x-real-ip"] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = value.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    headers
        .get("fly-client-ip")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `Authorization: Bearer <opaque>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 5.6.7.8"));
        headers.insert("cf-connecting-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_ip(&headers).as_deref(), Some("9.9.9.9"));

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 5.6.7.8"));
        assert_eq!(client_ip(&headers).as_deref(), Some("1.2.3.4"));

        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer tok_abc"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("tok_abc"));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
