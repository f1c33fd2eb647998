use std::sync::Arc;

use anyhow::Context;

use docmind::ai::client::{CompletionService, OpenAiCompletionService};
use docmind::app::{build_router, AppState};
use docmind::auth::token::TokenService;
use docmind::config::{AppConfig, StorageBackend};
use docmind::db::repository::{DocumentRepository, MongoDocumentRepository};
use docmind::db::user_repository::{MongoUserRepository, UserRepository};
use docmind::storage::client::{FileStore, LocalFileStore, S3FileStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docmind=info,tower_http=info".into()),
        )
        .init();

    tracing::info!("Starting docmind server...");

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Connect to MongoDB
    let mongo_client = mongodb::Client::with_uri_str(&config.mongodb_uri)
        .await
        .context("Failed to connect to MongoDB")?;
    let mongo_db = mongo_client.database(&config.mongodb_database);

    let documents = MongoDocumentRepository::new(&mongo_db);
    documents.ensure_indexes().await?;
    let users = MongoUserRepository::new(&mongo_db);
    users.ensure_indexes().await?;

    let document_repo: Arc<dyn DocumentRepository> = Arc::new(documents);
    let user_repo: Arc<dyn UserRepository> = Arc::new(users);

    tracing::info!("Connected to MongoDB at {}", config.mongodb_uri);

    // Upload storage
    let file_store: Arc<dyn FileStore> = match config.storage_backend {
        StorageBackend::Local => {
            let store = LocalFileStore::open(&config.upload_dir).await?;
            tracing::info!("Storing uploads in {}", store.root().display());
            Arc::new(store)
        }
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .context("s3_bucket is required for the s3 storage backend")?;
            tracing::info!("Storing uploads in S3 bucket {bucket}");
            Arc::new(S3FileStore::connect(bucket, config.s3_endpoint.as_deref()).await)
        }
    };

    // Completion provider
    let completion: Option<Arc<dyn CompletionService>> = match &config.openai_api_key {
        Some(key) if !key.trim().is_empty() => Some(Arc::new(OpenAiCompletionService::new(
            key,
            config.openai_model.clone(),
        ))),
        _ => {
            tracing::warn!("No OpenAI API key configured, AI routes will be unavailable");
            None
        }
    };

    let state = AppState {
        document_repo,
        user_repo,
        file_store,
        completion,
        tokens: Arc::new(TokenService::new(
            &config.jwt_secret,
            config.token_ttl_hours,
        )),
    };

    let app = build_router(state, config.max_upload_bytes);

    // Start the server
    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
