use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::{DocumentRecord, DocumentResponse, UpdateDocumentRequest};
use crate::db::repository::{
    DocumentFilter, DocumentPatch, DocumentRepository, DocumentSort, SortField,
};
use crate::error::AppError;
use crate::storage::client::FileStore;

/// Query string of `GET /api/documents`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub filter_type: Option<String>,
}

impl ListQuery {
    pub fn filter(&self, owner: ObjectId) -> DocumentFilter {
        let mut filter = DocumentFilter::owned_by(owner);
        if self.filter_type.as_deref() == Some("favorites") {
            filter = filter.favorites();
        }
        if let Some(query) = &self.query {
            filter = filter.matching(query);
        }
        filter
    }

    pub fn sort(&self) -> DocumentSort {
        DocumentSort {
            field: self
                .sort_by
                .as_deref()
                .map(SortField::from_query)
                .unwrap_or_default(),
            descending: self.sort_order.as_deref() != Some("asc"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Parse a hex identifier from a path segment.
///
/// Malformed identifiers cannot name an existing record, so they are
/// reported as not found rather than as a bad request.
pub fn parse_id(raw: &str, what: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw).map_err(|_| AppError::NotFound(format!("{what} not found")))
}

pub async fn find_owned(
    repo: &dyn DocumentRepository,
    owner: ObjectId,
    id: ObjectId,
) -> Result<DocumentRecord, AppError> {
    repo.find_one(&DocumentFilter::owned_by(owner).with_id(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".into()))
}

/// Delete a document owned by `owner`.
///
/// The stored file goes first and a failure there is only logged; the
/// record is removed regardless.
pub async fn delete_document(
    repo: &dyn DocumentRepository,
    store: &dyn FileStore,
    owner: ObjectId,
    id: ObjectId,
) -> Result<(), AppError> {
    let doc = find_owned(repo, owner, id).await?;

    match store.remove(&doc.file_path).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!("Stored file '{}' was already gone", doc.file_path),
        Err(e) => tracing::warn!("Failed to remove stored file '{}': {e}", doc.file_path),
    }

    let deleted = repo
        .delete_one(&DocumentFilter::owned_by(owner).with_id(id))
        .await?;
    if deleted == 0 {
        return Err(AppError::NotFound("Document not found".into()));
    }

    tracing::info!("Deleted document {id}");
    Ok(())
}

/// Axum handler for `GET /api/documents`.
pub async fn list_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    let docs = state
        .document_repo
        .find(&query.filter(user.user_id), query.sort())
        .await?;
    Ok(Json(docs.into_iter().map(DocumentResponse::from).collect()))
}

/// Axum handler for `GET /api/documents/{id}`.
pub async fn get_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, AppError> {
    let id = parse_id(&id, "Document")?;
    let doc = find_owned(state.document_repo.as_ref(), user.user_id, id).await?;
    Ok(Json(doc.into()))
}

/// Axum handler for `PATCH /api/documents/{id}`.
pub async fn update_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateDocumentRequest>,
) -> Result<Json<DocumentResponse>, AppError> {
    let id = parse_id(&id, "Document")?;
    let patch = DocumentPatch::from(request);
    let doc = state
        .document_repo
        .update_one(&DocumentFilter::owned_by(user.user_id).with_id(id), &patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".into()))?;
    Ok(Json(doc.into()))
}

/// Axum handler for `DELETE /api/documents/{id}`.
pub async fn delete_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id, "Document")?;
    delete_document(
        state.document_repo.as_ref(),
        state.file_store.as_ref(),
        user.user_id,
        id,
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Document deleted successfully".into(),
    }))
}

/// Axum handler for `GET /api/documents/{id}/file`.
///
/// Serves the stored bytes with a content type derived from the file type.
pub async fn download_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id, "Document")?;
    let doc = find_owned(state.document_repo.as_ref(), user.user_id, id).await?;

    let data = state
        .file_store
        .read(&doc.file_path)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    let disposition = format!("attachment; filename=\"{}\"", doc.original_filename);
    Ok((
        [
            (CONTENT_TYPE, doc.file_type.content_type().to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}
