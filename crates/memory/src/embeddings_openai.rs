/// OpenAI-compatible embeddings provider using the `/v1/embeddings` endpoint.
///
/// Works against OpenAI itself and against local servers that speak the same
/// protocol (text-embeddings-inference, Ollama, vLLM) serving bge-base-en-v1.5.
use std::time::Duration;

use async_trait::async_trait;
use {
    secrecy::ExposeSecret,
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::embeddings::EmbeddingProvider;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_MODEL: &str = "BAAI/bge-base-en-v1.5";
pub const DEFAULT_DIMENSIONS: usize = 768;

pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    api_key: Option<secrecy::Secret<String>>,
    base_url: String,
    model: String,
    dims: usize,
    batch_size: usize,
}

fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn has_version_suffix(base_url: &str) -> bool {
    let Some(last_segment) = base_url.rsplit('/').next() else {
        return false;
    };
    let Some(rest) = last_segment.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

fn embeddings_endpoint(base_url: &str) -> String {
    let normalized = normalize_base_url(base_url);
    if normalized.ends_with("/embeddings") {
        return normalized;
    }
    if normalized.ends_with("/v1") || has_version_suffix(&normalized) {
        return format!("{normalized}/embeddings");
    }
    format!("{normalized}/v1/embeddings")
}

impl Default for OpenAiEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiEmbeddingProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: None,
            base_url: normalize_base_url(DEFAULT_BASE_URL),
            model: DEFAULT_MODEL.to_string(),
            dims: DEFAULT_DIMENSIONS,
            batch_size: 32,
        }
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(secrecy::Secret::new(api_key));
        self
    }

    pub fn with_model(mut self, model: String, dims: usize) -> Self {
        self.model = model;
        self.dims = dims;
        self
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = normalize_base_url(&url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> anyhow::Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn request(&self, input: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let req = EmbeddingRequest {
            model: &self.model,
            input,
        };
        let mut builder = self.client.post(embeddings_endpoint(&self.base_url)).json(&req);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }
        let mut resp = builder
            .send()
            .await?
            .error_for_status()?
            .json::<EmbeddingResponse>()
            .await?;
        // Servers may answer out of order; `index` is authoritative.
        resp.data.sort_by_key(|d| d.index);
        Ok(resp.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(inputs = batch.len(), model = %self.model, "requesting embeddings");
            out.extend(self.request(batch).await?);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn warm_up(&self) -> anyhow::Result<()> {
        let probe = self.embed("ping").await?;
        anyhow::ensure!(
            probe.len() == self.dims,
            "model {} returned {} dimensions, expected {}",
            self.model,
            probe.len(),
            self.dims
        );
        Ok(())
    }
}
