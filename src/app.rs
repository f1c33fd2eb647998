use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::ai::client::CompletionService;
use crate::api;
use crate::auth::token::TokenService;
use crate::db::repository::DocumentRepository;
use crate::db::user_repository::UserRepository;
use crate::storage::client::FileStore;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub document_repo: Arc<dyn DocumentRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub file_store: Arc<dyn FileStore>,
    /// `None` when no provider key is configured; AI routes then fail.
    pub completion: Option<Arc<dyn CompletionService>>,
    pub tokens: Arc<TokenService>,
}

async fn health() -> Json<Value> {
    Json(json!({ "message": "docmind API is running" }))
}

/// Build the HTTP router with every API route.
///
/// `max_upload_bytes` caps request bodies, which bounds multipart uploads.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let auth = Router::new()
        .route("/register", post(api::auth::register_handler))
        .route("/login", post(api::auth::login_handler))
        .route("/me", get(api::auth::me_handler));

    let users = Router::new()
        .route("/", get(api::users::list_users_handler))
        .route(
            "/profile",
            get(api::users::profile_handler).patch(api::users::update_profile_handler),
        )
        .route(
            "/change-password",
            post(api::users::change_password_handler),
        )
        .route(
            "/{id}",
            get(api::users::get_user_handler)
                .patch(api::users::update_user_handler)
                .delete(api::users::delete_user_handler),
        );

    let documents = Router::new()
        .route("/", get(api::documents::list_handler))
        .route("/upload", post(api::ingest::upload_handler))
        .route(
            "/{id}",
            get(api::documents::get_handler)
                .patch(api::documents::update_handler)
                .delete(api::documents::delete_handler),
        )
        .route("/{id}/file", get(api::documents::download_handler));

    let ai = Router::new()
        .route("/summarize/{id}", post(api::ai::summarize_handler))
        .route("/extract-key-points/{id}", post(api::ai::key_points_handler))
        .route("/generate-tags/{id}", post(api::ai::tags_handler))
        .route("/search", post(api::ai::search_handler))
        .route("/ask/{id}", post(api::ai::ask_handler));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .nest("/api/auth", auth)
        .nest("/api/users", users)
        .nest("/api/documents", documents)
        .nest("/api/ai", ai)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
