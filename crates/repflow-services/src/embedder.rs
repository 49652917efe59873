//! Embedder capability.
//!
//! Produces the dense vectors stored alongside exercises. The bundled
//! provider speaks the OpenAI embeddings API; the dimension is fixed per
//! provider and must match the vector collection.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use repflow_core::{AppError, Config};

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError>;

    /// Dimension of vectors this embedder produces.
    fn dimension(&self) -> usize;
}

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-ada-002";
const ADA_002_DIM: usize = 1536;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiEmbedder {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| AppError::Internal("OPENAI_API_KEY not configured".into()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key,
        })
    }

    /// Override the endpoint base URL (tests point this at a local server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    #[tracing::instrument(skip(self, text), fields(chars = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| AppError::EmbedFailed(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbedFailed(format!(
                "API error {}: {}",
                status,
                body.chars().take(300).collect::<String>()
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::EmbedFailed(format!("unparseable response: {}", e)))?;
        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AppError::EmbedFailed("no embedding in response".into()))?;

        if embedding.len() != self.dimension() {
            return Err(AppError::EmbedFailed(format!(
                "provider returned {} dimensions, expected {}",
                embedding.len(),
                self.dimension()
            )));
        }
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        ADA_002_DIM
    }
}
