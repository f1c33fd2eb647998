#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bson::doc;
use bson::oid::ObjectId;
use futures::TryStreamExt;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::minio::MinIO;
use testcontainers_modules::mongo::Mongo;

use docmind::ai::client::CompletionService;
use docmind::app::{build_router, AppState};
use docmind::auth::models::Role;
use docmind::auth::token::TokenService;
use docmind::db::models::DocumentRecord;
use docmind::db::repository::MongoDocumentRepository;
use docmind::db::user_repository::{MongoUserRepository, UserPatch, UserRepository};
use docmind::error::AppError;
use docmind::storage::client::S3FileStore;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024;
pub const BUCKET: &str = "docmind-test";

/// Completion provider that answers every request with a fixed reply.
pub struct CannedCompletion {
    pub reply: String,
    pub calls: Mutex<Vec<String>>,
}

impl CannedCompletion {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionService for CannedCompletion {
    async fn complete(
        &self,
        _system: &str,
        prompt: &str,
        _max_tokens: u32,
    ) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// Holds running containers and the application state wired to them.
///
/// Containers are kept alive for as long as this struct lives. When dropped,
/// containers are stopped and cleaned up automatically.
pub struct TestEnv {
    _mongo: ContainerAsync<Mongo>,
    _minio: ContainerAsync<MinIO>,
    pub db: mongodb::Database,
    pub s3: aws_sdk_s3::Client,
    pub documents: Arc<MongoDocumentRepository>,
    pub users: Arc<MongoUserRepository>,
    pub store: Arc<S3FileStore>,
    pub tokens: Arc<TokenService>,
    state: AppState,
}

impl TestEnv {
    /// Spin up MongoDB and MinIO with no completion provider configured.
    pub async fn start() -> Self {
        Self::build(None).await
    }

    pub async fn with_completion(completion: Arc<dyn CompletionService>) -> Self {
        Self::build(Some(completion)).await
    }

    async fn build(completion: Option<Arc<dyn CompletionService>>) -> Self {
        let (mongo_container, minio_container) =
            tokio::join!(Mongo::default().start(), MinIO::default().start());
        let mongo_container = mongo_container.expect("Failed to start MongoDB container");
        let minio_container = minio_container.expect("Failed to start MinIO container");

        // --- MongoDB ---
        let mongo_port = mongo_container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");
        let mongo_client = mongodb::Client::with_uri_str(format!("mongodb://127.0.0.1:{mongo_port}"))
            .await
            .expect("Failed to connect to MongoDB");
        let db = mongo_client.database("docmind_test");

        let documents = Arc::new(MongoDocumentRepository::new(&db));
        documents
            .ensure_indexes()
            .await
            .expect("Failed to create document indexes");
        let users = Arc::new(MongoUserRepository::new(&db));
        users
            .ensure_indexes()
            .await
            .expect("Failed to create user indexes");

        // --- MinIO (S3) ---
        let minio_port = minio_container
            .get_host_port_ipv4(9000)
            .await
            .expect("Failed to get MinIO port");

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .endpoint_url(format!("http://127.0.0.1:{minio_port}"))
            .region(aws_config::Region::new("us-east-1"))
            .credentials_provider(aws_sdk_s3::config::Credentials::new(
                "minioadmin",
                "minioadmin",
                None,
                None,
                "minio",
            ))
            .load()
            .await;
        let s3 = aws_sdk_s3::Client::from_conf(
            aws_sdk_s3::config::Builder::from(&s3_config)
                .force_path_style(true)
                .build(),
        );
        s3.create_bucket()
            .bucket(BUCKET)
            .send()
            .await
            .expect("Failed to create test bucket");

        let store = Arc::new(S3FileStore::new(s3.clone(), BUCKET.to_string()));
        let tokens = Arc::new(TokenService::new(TEST_SECRET, 1));

        let state = AppState {
            document_repo: documents.clone(),
            user_repo: users.clone(),
            file_store: store.clone(),
            completion,
            tokens: tokens.clone(),
        };

        Self {
            _mongo: mongo_container,
            _minio: minio_container,
            db,
            s3,
            documents,
            users,
            store,
            tokens,
            state,
        }
    }

    /// A server that fails the test on any non-2xx response.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .build(build_router(self.state.clone(), MAX_UPLOAD_BYTES))
    }

    /// A server that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder().build(build_router(self.state.clone(), MAX_UPLOAD_BYTES))
    }

    /// Register a user through the API and return `(user id, token)`.
    pub async fn register(&self, server: &axum_test::TestServer, email: &str) -> (String, String) {
        let response = server
            .post("/api/auth/register")
            .json(&serde_json::json!({
                "fullName": "Test User",
                "email": email,
                "password": "password123"
            }))
            .await;

        let body: serde_json::Value = response.json();
        (
            body["user"]["_id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    /// Promote a registered user and return a fresh admin token.
    pub async fn promote(&self, user_id: &str) -> String {
        let id = ObjectId::parse_str(user_id).unwrap();
        let patch = UserPatch {
            role: Some(Role::Admin),
            ..UserPatch::default()
        };
        self.users.update_one(id, &patch).await.unwrap().unwrap();
        self.tokens.issue(&id, Role::Admin).unwrap()
    }

    /// Every document record, read straight from the collection.
    pub async fn all_documents(&self) -> Vec<DocumentRecord> {
        self.db
            .collection::<DocumentRecord>("documents")
            .find(doc! {})
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap()
    }

    /// Number of objects currently stored under the upload prefix.
    pub async fn stored_files(&self) -> usize {
        self.s3
            .list_objects_v2()
            .bucket(BUCKET)
            .prefix("uploads/")
            .send()
            .await
            .unwrap()
            .contents()
            .len()
    }
}
