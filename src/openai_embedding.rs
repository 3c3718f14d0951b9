//! Network embedding provider, the application-layer counterpart to
//! `ping_mem_core::embedding::LocalProvider`.
//!
//! Calls the OpenAI `/v1/embeddings` endpoint with exponential-backoff
//! retry. `ping-mem-core` only ships the deterministic local provider;
//! anything that makes a network call lives here, one level up, per its
//! own documented boundary.

use std::time::Duration;

use async_trait::async_trait;
use ping_mem_core::embedding::EmbeddingProvider;
use ping_mem_core::error::{Error, Result};

use crate::config::EmbeddingConfig;

/// Embeds via the OpenAI embeddings API.
///
/// Retry strategy: HTTP 429 and 5xx retry with exponential backoff
/// (1s, 2s, 4s, ... capped at 2^5); other 4xx responses fail immediately.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.api_key is required for provider 'openai'"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model: "text-embedding-3-small".to_string(),
            dims: config.dims,
            max_retries: 5,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self
            .embed_batch(std::slice::from_ref(&text.to_string()))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| Error::Embedding(format!("invalid response body: {e}")))?;
                        return parse_response(&json);
                    }
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::Embedding(format!("OpenAI {status}: {body_text}")));
                        continue;
                    }
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Error::Embedding(format!("OpenAI {status}: {body_text}")));
                }
                Err(e) => {
                    last_err = Some(Error::Embedding(format!("request failed: {e}")));
                    continue;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Embedding("embedding failed after retries".into())))
    }
}

fn parse_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::Embedding("missing 'data' array in OpenAI response".to_string()))?;

    Ok(data
        .iter()
        .map(|item| {
            item.get("embedding")
                .and_then(|e| e.as_array())
                .map(|arr| arr.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
                .unwrap_or_default()
        })
        .collect())
}
