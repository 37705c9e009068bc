use super::RagError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

const BATCH_SIZE: usize = 20;
const PROBE_TEXT: &str = "dimension probe";

/// Maps text into the shared vector space.
///
/// One instance is constructed at startup and shared by reference; every
/// vector it returns has length [`Embedder::dimension`].
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn model_id(&self) -> &str;

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.embed_many(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RagError::Embedding("embedding backend returned no vector".into()))
    }
}

/// Check that every vector has the embedder's dimension.
pub fn ensure_dimension(expected: usize, vectors: &[Vec<f32>]) -> Result<(), RagError> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(v) => Err(RagError::DimensionMismatch {
            expected,
            actual: v.len(),
        }),
        None => Ok(()),
    }
}

#[derive(Debug, Clone)]
pub struct ApiEmbedderConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
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
    embedding: Vec<f32>,
}

/// Embeddings from an OpenAI-compatible `/embeddings` endpoint.
pub struct ApiEmbedder {
    client: Client,
    config: ApiEmbedderConfig,
    dimension: usize,
}

impl ApiEmbedder {
    /// Probe the endpoint once to learn the model's output dimension.
    pub async fn connect(config: ApiEmbedderConfig) -> Result<Self, RagError> {
        let client = Client::new();
        let probe = request_embeddings(&client, &config, &[PROBE_TEXT.to_string()]).await?;
        let dimension = probe
            .first()
            .map(Vec::len)
            .filter(|d| *d > 0)
            .ok_or_else(|| RagError::Embedding("embedding probe returned no vector".into()))?;

        info!(model = %config.model, dimension, "embedding endpoint ready");
        Ok(Self {
            client,
            config,
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for ApiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            let embedded = request_embeddings(&self.client, &self.config, batch).await?;
            if embedded.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }
        ensure_dimension(self.dimension, &vectors)?;
        Ok(vectors)
    }
}

async fn request_embeddings(
    client: &Client,
    config: &ApiEmbedderConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, RagError> {
    let body = EmbeddingRequest {
        model: &config.model,
        input: texts,
    };

    let mut req = client
        .post(format!("{}/embeddings", config.base_url))
        .header("Content-Type", "application/json")
        .json(&body);

    if !config.api_key.is_empty() {
        req = req.header("Authorization", format!("Bearer {}", config.api_key));
    }

    let resp = req
        .send()
        .await
        .map_err(|e| RagError::Embedding(e.to_string()))?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(RagError::Embedding(format!(
            "embedding API error: {} - {}",
            status, text
        )));
    }

    let data: EmbeddingResponse = resp
        .json()
        .await
        .map_err(|e| RagError::Embedding(e.to_string()))?;
    Ok(data.data.into_iter().map(|d| d.embedding).collect())
}

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use super::{ensure_dimension, Embedder, RagError, PROBE_TEXT};
    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing::info;

    const MODEL_ID: &str = "all-MiniLM-L6-v2";

    /// all-MiniLM-L6-v2 running in-process through ONNX.
    pub struct LocalEmbedder {
        model: Arc<Mutex<TextEmbedding>>,
        dimension: usize,
    }

    impl LocalEmbedder {
        pub fn load() -> Result<Self, RagError> {
            let mut model = TextEmbedding::try_new(
                InitOptions::new(EmbeddingModel::AllMiniLML6V2)
                    .with_show_download_progress(true),
            )
            .map_err(|e| RagError::Embedding(e.to_string()))?;

            let dimension = model
                .embed(vec![PROBE_TEXT], None)
                .map_err(|e| RagError::Embedding(e.to_string()))?
                .first()
                .map(Vec::len)
                .ok_or_else(|| RagError::Embedding("model produced no vector".into()))?;

            info!(model = MODEL_ID, dimension, "local embedding model loaded");
            Ok(Self {
                model: Arc::new(Mutex::new(model)),
                dimension,
            })
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_id(&self) -> &str {
            MODEL_ID
        }

        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();
            let vectors = tokio::task::spawn_blocking(move || model.lock().embed(texts, None))
                .await
                .map_err(|e| RagError::Embedding(e.to_string()))?
                .map_err(|e| RagError::Embedding(e.to_string()))?;
            ensure_dimension(self.dimension, &vectors)?;
            Ok(vectors)
        }
    }
}

/// Serialize embedding to bytes for SQLite BLOB storage
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize embedding from SQLite BLOB bytes
pub fn bytes_to_embedding(bytes: &[u8]) -> Result<Vec<f32>, RagError> {
    if bytes.len() % 4 != 0 {
        return Err(RagError::CorruptEmbedding(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
