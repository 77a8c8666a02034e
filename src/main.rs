use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use inspection_backend::analysis::CleaningAnalyzer;
use inspection_backend::app::{create_app, AppState};
use inspection_backend::config::Settings;
use inspection_backend::domain::StorageType;
use inspection_backend::pipeline::{spawn_worker, DocumentProcessor, JobQueue};
use inspection_backend::repository::{DocumentStore, InMemoryDocumentStore, PgDocumentStore};
use inspection_backend::services::{
    AiFallback, AnalysisCache, DisabledModel, GeminiClient, GenerativeModel, HttpParseExtractor,
    LocalPdfExtractor, MemoryAnalysisCache, RedisCache, TextExtractor,
};
use inspection_backend::storage::{
    BlobStore, HttpBlobStore, LocalFileStore, PgBlobStore, StorageRegistry,
};
use inspection_backend::{db, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting inspection backend"
    );

    // Document store
    let pool = match &settings.database_url {
        Some(url) => Some(db::create_pool(url, settings.database_max_connections).await?),
        None => {
            tracing::warn!("DATABASE_URL not set, documents are kept in memory only");
            None
        }
    };
    let store: Arc<dyn DocumentStore> = match &pool {
        Some(pool) => Arc::new(PgDocumentStore::new(pool.clone())),
        None => Arc::new(InMemoryDocumentStore::new()),
    };

    // Analysis cache
    let cache_ttl = settings.analysis_cache_ttl_seconds;
    let cache: Arc<dyn AnalysisCache> = match &settings.redis_url {
        Some(url) => match RedisCache::new(url, cache_ttl).await {
            Ok(cache) => {
                tracing::info!("Redis cache initialized");
                Arc::new(cache)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, using in-process cache");
                Arc::new(MemoryAnalysisCache::new(Duration::from_secs(cache_ttl)))
            }
        },
        None => Arc::new(MemoryAnalysisCache::new(Duration::from_secs(cache_ttl))),
    };

    // Blob storage: every available backend stays readable, the configured one takes uploads
    let local: Arc<dyn BlobStore> = Arc::new(LocalFileStore::new(&settings.local_storage_dir));
    let blob_service: Option<Arc<dyn BlobStore>> = match &settings.blob_service_url {
        Some(url) => Some(Arc::new(HttpBlobStore::new(
            url,
            settings.blob_service_token.clone(),
            60,
        )?)),
        None => None,
    };
    let database_blobs: Option<Arc<dyn BlobStore>> = pool
        .clone()
        .map(|pool| Arc::new(PgBlobStore::new(pool)) as Arc<dyn BlobStore>);

    let default_store = match settings.storage_backend {
        StorageType::Local => local.clone(),
        StorageType::BlobService => blob_service
            .clone()
            .context("BLOB_SERVICE_URL must be set for blob_service storage")?,
        StorageType::Database => database_blobs
            .clone()
            .context("DATABASE_URL must be set for database storage")?,
    };
    let mut storage = StorageRegistry::new(default_store);
    for store in [Some(local), blob_service, database_blobs].into_iter().flatten() {
        if store.storage_type() != storage.default_type() {
            storage = storage.with_store(store);
        }
    }
    let storage = Arc::new(storage);
    tracing::info!(default = %storage.default_type(), "Blob storage initialized");

    // Text extraction
    let extractor: Arc<dyn TextExtractor> = match &settings.parse_service_url {
        Some(url) => Arc::new(HttpParseExtractor::new(
            url,
            settings.parse_service_api_key.clone(),
            Duration::from_secs(settings.parse_poll_interval_seconds),
            Duration::from_secs(settings.parse_timeout_seconds),
        )?),
        None => {
            tracing::warn!("PARSE_SERVICE_URL not set, reading PDF text layers locally");
            Arc::new(LocalPdfExtractor)
        }
    };

    // Generative model
    let model: Arc<dyn GenerativeModel> = match &settings.gemini_api_key {
        Some(key) => Arc::new(GeminiClient::new(
            &settings.gemini_base_url,
            key,
            &settings.gemini_model,
            settings.ai_timeout_seconds,
        )?),
        None => {
            tracing::warn!("GEMINI_API_KEY not set, AI fallback and chat are disabled");
            Arc::new(DisabledModel)
        }
    };

    // Processing pipeline
    let analyzer = Arc::new(CleaningAnalyzer::new(
        cache.clone(),
        settings.alternative_confidence_factor,
    ));
    let (queue, receiver) = JobQueue::new();
    let processor = Arc::new(DocumentProcessor::new(
        store.clone(),
        storage.clone(),
        extractor,
        analyzer,
        AiFallback::new(model),
        queue,
        settings.pipeline(),
    ));
    spawn_worker(receiver, processor.clone());

    // Create application state
    let state = AppState::new(settings.clone(), store, storage, cache, processor);

    // Build application
    let app = create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
