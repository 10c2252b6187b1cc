//! Common test utilities for HTTP integration tests.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use clawdhub_http::server::AppState;
use clawdhub_registry::{
    sha256_hex, ApiToken, BasicSummarizer, EmbeddingProvider, MemoryObjectStore, MemoryStore,
    MetadataStore, NoopHooks, Registry, Role, User,
};
use std::sync::Arc;
use tower::ServiceExt;

pub const TOKEN_U1: &str = "tok-u1";
pub const TOKEN_U2: &str = "tok-u2";
pub const TOKEN_ADMIN: &str = "tok-admin";

/// Deterministic embedding provider for tests.
struct HashEmbedder;

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_documents(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 8];
                for (i, b) in t.bytes().enumerate() {
                    v[i % 8] += (b as f32) / 255.0;
                }
                v
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        8
    }

    fn model_name(&self) -> &str {
        "hash-test"
    }

    fn provider_name(&self) -> &str {
        "test"
    }
}

/// Test app with seeded principals.
pub struct TestApp {
    pub state: Arc<AppState>,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        seed_user(store.as_ref(), "u1", Role::User, TOKEN_U1).await;
        seed_user(store.as_ref(), "u2", Role::User, TOKEN_U2).await;
        seed_user(store.as_ref(), "root", Role::Admin, TOKEN_ADMIN).await;

        let registry = Arc::new(Registry::new(
            store,
            Arc::new(MemoryObjectStore::new()),
            Arc::new(HashEmbedder),
            Arc::new(BasicSummarizer),
            Arc::new(NoopHooks),
        ));
        let state = Arc::new(AppState::new(registry));
        Self { state }
    }

    /// Make a request to the app and get the response.
    pub async fn request(&self, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let (status, _headers, body) = self.request_full(req).await;
        (status, body)
    }

    /// Make a request and keep the response headers too.
    pub async fn request_full(
        &self,
        req: Request<Body>,
    ) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let app = clawdhub_http::routes::create_app(self.state.clone());
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    pub fn get(path: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    pub fn get_with_token(path: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(path)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    pub fn post_empty(path: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    pub fn post_with_token(path: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    pub fn delete_with_token(path: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(path)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    pub fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> T {
        serde_json::from_slice(body).expect("Failed to parse JSON response")
    }
}

async fn seed_user(store: &dyn MetadataStore, id: &str, role: Role, token: &str) {
    store
        .put_user(&User {
            id: id.to_string(),
            handle: Some(id.to_string()),
            display_name: id.to_string(),
            image: None,
            role,
            deleted_at: None,
        })
        .await
        .unwrap();
    store
        .put_token(&ApiToken {
            id: format!("token-{id}"),
            token_hash: sha256_hex(token.as_bytes()),
            user_id: id.to_string(),
            label: "test".to_string(),
            created_at: chrono::Utc::now(),
            revoked_at: None,
        })
        .await
        .unwrap();
}

const BOUNDARY: &str = "clawdhub-test-boundary";

/// Build a multipart publish request: a `payload` JSON field plus one
/// part per file, the way the CLI uploads bundles.
pub fn multipart_publish(
    token: &str,
    payload: &serde_json::Value,
    files: &[(&str, &str)],
) -> Request<Body> {
    let mut body = String::new();
    body.push_str(&format!("--{BOUNDARY}\r\n"));
    body.push_str("Content-Disposition: form-data; name=\"payload\"\r\n\r\n");
    body.push_str(&payload.to_string());
    body.push_str("\r\n");
    for (path, content) in files {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        body.push_str(&format!(
            "Content-Disposition: form-data; name=\"files\"; filename=\"{path}\"\r\n"
        ));
        body.push_str("Content-Type: text/markdown\r\n\r\n");
        body.push_str(content);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method("POST")
        .uri("/api/v1/skills")
        .header("authorization", format!("Bearer {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
