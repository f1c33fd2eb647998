use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use bson::oid::ObjectId;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::{DocumentRecord, DocumentResponse, FileType};
use crate::db::repository::DocumentRepository;
use crate::error::AppError;
use crate::extract::{self, ExtractionError};
use crate::storage::client::FileStore;

/// Stored as content when the extractor rejects the file.
pub const EXTRACTION_FAILED_CONTENT: &str = "Error extracting content from file.";

/// Stored as content for formats the extractor does not handle.
pub const UNSUPPORTED_CONTENT: &str = "Content extraction not supported for this file type.";

/// The raw file part of an upload request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Filename as sent by the client. Untrusted.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Core ingestion logic, separated from the HTTP layer for testability.
///
/// Validates the upload, writes the bytes to the file store, extracts text
/// and inserts the resulting record. If a step after the write fails the
/// stored file is removed again before the error is returned.
pub async fn process_ingest(
    repo: &dyn DocumentRepository,
    store: &dyn FileStore,
    owner: ObjectId,
    upload: Option<UploadedFile>,
    title: Option<String>,
    tags_csv: Option<&str>,
) -> Result<DocumentRecord, AppError> {
    // 1. Require a file with a name
    let upload = upload
        .filter(|u| !u.filename.trim().is_empty())
        .ok_or_else(|| AppError::Validation("No file uploaded.".into()))?;

    // 2. Check the extension against the allowed set
    let base_name = last_path_component(&upload.filename);
    let file_type = extension_of(base_name)
        .and_then(FileType::from_extension)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Invalid file type '{}'. Only PDF, DOC, DOCX, TXT, PPT, and PPTX files are allowed.",
                base_name
            ))
        })?;

    // 3. Display name from the client, storage name from us
    let original_filename = sanitize_filename(base_name, file_type);
    let storage_name = format!("{}.{}", Uuid::new_v4(), file_type.extension());

    // 4. Persist the bytes
    let file_path = store.save(&storage_name, upload.bytes).await?;
    let file_size = match store.size_of(&file_path).await {
        Ok(size) => size,
        Err(e) => {
            discard(store, &file_path, "size lookup").await;
            return Err(e);
        }
    };

    // 5. Extract text, degrading to a placeholder on failure
    let content = if extract::is_extractable(file_type) {
        match extract_stored(store, &file_path, file_type).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Extraction failed for '{original_filename}': {e}");
                EXTRACTION_FAILED_CONTENT.to_string()
            }
        }
    } else {
        UNSUPPORTED_CONTENT.to_string()
    };

    let title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| original_filename.clone());

    let mut record = DocumentRecord::new(
        owner,
        title,
        original_filename,
        file_type,
        file_size,
        file_path,
        content,
        parse_tags(tags_csv),
    );

    // 6. Insert, cleaning up the stored file if that fails
    match repo.insert(&record).await {
        Ok(id) => {
            record.id = Some(id);
            tracing::info!(
                "Ingested document {} ({}, {} bytes)",
                id,
                record.file_type,
                record.file_size
            );
            Ok(record)
        }
        Err(e) => {
            discard(store, &record.file_path, "insert").await;
            Err(e)
        }
    }
}

/// Best-effort removal of a stored file whose ingestion failed at `stage`.
async fn discard(store: &dyn FileStore, path: &str, stage: &str) {
    if let Err(e) = store.remove(path).await {
        tracing::warn!("Failed to remove '{path}' after {stage} error: {e}");
    }
}

/// Read the stored bytes back and run the extractor on the blocking pool.
async fn extract_stored(
    store: &dyn FileStore,
    path: &str,
    file_type: FileType,
) -> Result<String, ExtractionError> {
    let bytes = store
        .read(path)
        .await
        .map_err(|e| ExtractionError::Read(e.to_string()))?
        .ok_or_else(|| ExtractionError::Read(format!("'{path}' vanished after write")))?;

    tokio::task::spawn_blocking(move || extract::extract(file_type, &bytes))
        .await
        .map_err(|e| ExtractionError::Aborted(e.to_string()))?
}

/// Split a comma-separated tag list, trimming entries and dropping blanks.
pub fn parse_tags(csv: Option<&str>) -> Vec<String> {
    csv.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

/// Client filenames may carry either path separator.
fn last_path_component(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

/// Leading dots mark a hidden file, not an extension.
fn extension_of(name: &str) -> Option<&str> {
    name.trim_start_matches('.')
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

/// Reduce a client filename to `[A-Za-z0-9._-]`, for display only.
pub fn sanitize_filename(name: &str, file_type: FileType) -> String {
    let cleaned: String = last_path_component(name)
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        format!("document.{}", file_type.extension())
    } else {
        trimmed.to_string()
    }
}

/// Axum handler for `POST /api/documents/upload`.
pub async fn upload_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentResponse>), AppError> {
    let mut upload = None;
    let mut title = None;
    let mut tags = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "document" | "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;
                upload = Some(UploadedFile {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            "title" => {
                title = Some(field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read title: {e}"))
                })?);
            }
            "tags" => {
                tags = Some(field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read tags: {e}"))
                })?);
            }
            other => tracing::debug!("Ignoring multipart field '{other}'"),
        }
    }

    let record = process_ingest(
        state.document_repo.as_ref(),
        state.file_store.as_ref(),
        user.user_id,
        upload,
        title,
        tags.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(record.into())))
}
