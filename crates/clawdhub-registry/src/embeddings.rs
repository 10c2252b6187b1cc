//! Embedding provider abstraction.
//!
//! The registry treats embedding as an external function `text -> vector`.
//! The vector dimension is per-deployment, negotiated from the configured
//! provider's `dimensions()`; the store only compares vectors of matching
//! dimension.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Trait for embedding generation providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple documents, one per input, in order.
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single query.
    ///
    /// Some providers optimize query embeddings differently than document
    /// embeddings. By default, this calls embed_documents with a single item.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_documents(vec![text.to_string()]).await?;
        results.into_iter().next().ok_or_else(|| {
            anyhow::anyhow!("embed_documents returned empty result for single query")
        })
    }

    /// Get the embedding dimension size
    fn dimensions(&self) -> usize;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

/// Configuration for the remote embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings endpoint.
    pub base_url: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// API key, if the endpoint requires one.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Vector dimension the deployment runs at.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_dimensions() -> usize {
    384
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "all-minilm".to_string(),
            api_key: None,
            dimensions: default_dimensions(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Remote provider speaking the OpenAI-compatible `/embeddings` protocol.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbeddingProvider {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&EmbeddingsRequest {
            model: &self.config.model,
            input: &texts,
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            anyhow::bail!(
                "embedding endpoint returned {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            );
        }

        let parsed: EmbeddingsResponse = response.json().await?;
        if parsed.data.len() != texts.len() {
            anyhow::bail!(
                "embedding endpoint returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            );
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProvider {
        dims: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for MockProvider {
        async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1; self.dims]).collect())
        }

        fn dimensions(&self) -> usize {
            self.dims
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }

    #[tokio::test]
    async fn test_embed_query_default() {
        let provider = MockProvider { dims: 384 };
        let embedding = provider.embed_query("test query").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.dimensions, 384);
        assert!(config.api_key.is_none());
    }
}
