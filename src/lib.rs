pub mod commands;
pub mod config;
pub mod db;
pub mod doc_processor;
pub mod error;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod service;

#[cfg(test)]
mod testing;

use anyhow::Context;
use config::{AppConfig, EmbeddingBackend};
use db::Database;
use rag::{ApiEmbedder, ApiEmbedderConfig, Embedder};
use service::ChatService;
use std::sync::Arc;
use tracing::info;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub service: Arc<ChatService>,
    /// Model used when a request does not name one.
    pub default_model: String,
}

async fn load_embedder(backend: &EmbeddingBackend) -> anyhow::Result<Arc<dyn Embedder>> {
    match backend {
        EmbeddingBackend::Api {
            base_url,
            api_key,
            model,
        } => {
            let embedder = ApiEmbedder::connect(ApiEmbedderConfig {
                base_url: base_url.clone(),
                api_key: api_key.clone(),
                model: model.clone(),
            })
            .await
            .with_context(|| format!("embedding endpoint {} unavailable", base_url))?;
            Ok(Arc::new(embedder))
        }
        #[cfg(feature = "local-embeddings")]
        EmbeddingBackend::Local => {
            let embedder = tokio::task::spawn_blocking(rag::embedding::LocalEmbedder::load)
                .await?
                .context("failed to load local embedding model")?;
            Ok(Arc::new(embedder))
        }
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingBackend::Local => anyhow::bail!(
            "EMBEDDING_BACKEND=local requires building with the `local-embeddings` feature"
        ),
    }
}

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    logging::init(&config.log_dir)?;

    let database = Arc::new(
        Database::open(&config.data_dir)
            .with_context(|| format!("failed to open database in {}", config.data_dir.display()))?,
    );
    let embedder = load_embedder(&config.embedding).await?;
    info!(
        model = embedder.model_id(),
        dimension = embedder.dimension(),
        "embedder ready"
    );

    let service = ChatService::new(
        database.clone(),
        database.clone(),
        embedder,
        config.rag.clone(),
    );
    let state = AppState {
        db: database,
        service: Arc::new(service),
        default_model: config.default_model.clone(),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, default_model = %config.default_model, "botgpt listening");

    axum::serve(listener, commands::router(state)).await?;
    Ok(())
}
