//! Embeddings from an OpenAI-compatible HTTP service.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmbeddingProvider, check_dimensions};
use crate::error::EmbeddingError;
use crate::models::RemoteEmbeddingConfig;
use crate::utils::retry::{RetryConfig, Retryable, with_retry};

/// Request body for the /embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

/// Response from the /embeddings endpoint.
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
    index: usize,
}

/// Client for a remote embedding model.
#[derive(Debug, Clone)]
pub struct RemoteProvider {
    client: Client,
    endpoint: String,
    model: String,
    name: String,
    dimension: usize,
    batch_size: usize,
    retry: RetryConfig,
}

impl RemoteProvider {
    pub fn new(config: &RemoteEmbeddingConfig, api_key: &str) -> Result<Self, EmbeddingError> {
        if api_key.trim().is_empty() {
            return Err(EmbeddingError::ProviderUnavailable(
                "missing API key for remote embeddings".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| EmbeddingError::ProviderUnavailable("invalid API key".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::ProviderUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.url.trim_end_matches('/')),
            model: config.model.clone(),
            name: format!("remote:{}", config.model),
            dimension: config.dimension as usize,
            batch_size: config.batch_size.max(1) as usize,
            retry: RetryConfig::new(config.max_retries),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Only the text-embedding-3 family accepts a requested output size.
    fn requested_dimensions(&self) -> Option<u32> {
        self.model
            .starts_with("text-embedding-3")
            .then_some(self.dimension as u32)
    }

    async fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
            dimensions: self.requested_dimensions(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else {
                    EmbeddingError::RequestError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ServerError(format!(
                "status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        order_by_index(parsed, texts.len())
    }
}

/// Restore input order and check that every input got exactly one vector.
fn order_by_index(mut parsed: EmbedResponse, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    parsed.data.sort_by_key(|entry| entry.index);
    let in_sequence = parsed
        .data
        .iter()
        .enumerate()
        .all(|(i, entry)| entry.index == i);
    if parsed.data.len() != expected || !in_sequence {
        return Err(EmbeddingError::InvalidResponse(format!(
            "received {} embeddings for {} inputs",
            parsed.data.len(),
            expected
        )));
    }
    Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
}

/// Collapse transport and auth failures into `ProviderUnavailable`.
fn surface(error: EmbeddingError) -> EmbeddingError {
    let unavailable = match &error {
        EmbeddingError::ServerError(msg) => {
            error.is_retryable() || msg.starts_with("status 401") || msg.starts_with("status 403")
        }
        EmbeddingError::RequestError(_) | EmbeddingError::Timeout => true,
        _ => false,
    };

    if unavailable {
        EmbeddingError::ProviderUnavailable(error.to_string())
    } else {
        error
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let embeddings = with_retry(&self.retry, || self.embed_single_batch(batch))
                .await
                .into_result()
                .map_err(surface)?;
            all_embeddings.extend(embeddings);
        }

        check_dimensions(&all_embeddings, texts.len(), self.dimension)?;
        tracing::debug!(count = all_embeddings.len(), model = %self.model, "remote embeddings received");
        Ok(all_embeddings)
    }
}
