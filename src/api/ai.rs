use axum::extract::{Path, State};
use axum::Json;
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::ai::client::CompletionService;
use crate::ai::parse::{
    parse_key_points, parse_relevance, parse_tags, text_snippet, truncate_content,
};
use crate::api::documents::{find_owned, parse_id};
use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::{DocumentRecord, FileType};
use crate::db::repository::{DocumentFilter, DocumentPatch, DocumentRepository, DocumentSort};
use crate::error::AppError;

const SUMMARY_SYSTEM: &str =
    "You are a helpful assistant that writes concise, accurate summaries of documents.";
const KEY_POINTS_SYSTEM: &str = "You are a helpful assistant that extracts the key points of \
     documents. Reply with a JSON array of strings.";
const TAGS_SYSTEM: &str = "You are a helpful assistant that assigns short topical tags to \
     documents. Reply with a JSON array of 3 to 5 lowercase strings.";
const RELEVANCE_SYSTEM: &str = "You are a helpful assistant that determines if a document is \
     relevant to a query and extracts the most relevant snippet.";
const ANSWER_SYSTEM: &str =
    "You are a helpful assistant that answers questions about documents based only on their content.";

/// Text-search hits returned before falling back to the provider.
const SEARCH_LIMIT: usize = 10;
/// Recent documents the provider is asked to judge when text search misses.
const SEMANTIC_CANDIDATES: usize = 20;
const SEMANTIC_EXCERPT_CHARS: usize = 1_000;

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPointsResponse {
    pub key_points: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub file_type: FileType,
    pub created_at: DateTime<Utc>,
    pub snippet: String,
    /// Only present on provider-judged results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant: Option<bool>,
}

impl SearchResult {
    fn new(doc: &DocumentRecord, snippet: String, relevant: Option<bool>) -> Self {
        Self {
            id: doc.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: doc.title.clone(),
            file_type: doc.file_type,
            created_at: doc.created_at,
            snippet,
            relevant,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
}

fn require(ai: Option<&dyn CompletionService>) -> Result<&dyn CompletionService, AppError> {
    ai.ok_or_else(|| AppError::Ai("No completion provider is configured".into()))
}

async fn save_patch(
    repo: &dyn DocumentRepository,
    owner: ObjectId,
    id: ObjectId,
    patch: DocumentPatch,
) -> Result<(), AppError> {
    repo.update_one(&DocumentFilter::owned_by(owner).with_id(id), &patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".into()))?;
    Ok(())
}

/// Summarize a document, reusing a stored summary when there is one.
pub async fn summarize(
    repo: &dyn DocumentRepository,
    ai: Option<&dyn CompletionService>,
    owner: ObjectId,
    id: ObjectId,
) -> Result<String, AppError> {
    let doc = find_owned(repo, owner, id).await?;
    if let Some(summary) = doc.summary.filter(|s| !s.trim().is_empty()) {
        return Ok(summary);
    }

    let prompt = format!(
        "Summarize the following document in a few paragraphs:\n\n{}",
        truncate_content(&doc.content)
    );
    let summary = require(ai)?.complete(SUMMARY_SYSTEM, &prompt, 500).await?;

    let patch = DocumentPatch {
        summary: Some(summary.clone()),
        ..DocumentPatch::default()
    };
    save_patch(repo, owner, id, patch).await?;
    Ok(summary)
}

/// Extract key points, reusing stored ones when the list is non-empty.
pub async fn extract_key_points(
    repo: &dyn DocumentRepository,
    ai: Option<&dyn CompletionService>,
    owner: ObjectId,
    id: ObjectId,
) -> Result<Vec<String>, AppError> {
    let doc = find_owned(repo, owner, id).await?;
    if !doc.key_points.is_empty() {
        return Ok(doc.key_points);
    }

    let prompt = format!(
        "Extract the 5 to 7 most important points from the following document:\n\n{}",
        truncate_content(&doc.content)
    );
    let reply = require(ai)?.complete(KEY_POINTS_SYSTEM, &prompt, 500).await?;
    let key_points = parse_key_points(&reply);

    let patch = DocumentPatch {
        key_points: Some(key_points.clone()),
        ..DocumentPatch::default()
    };
    save_patch(repo, owner, id, patch).await?;
    Ok(key_points)
}

/// Generate tags. Always calls the provider and replaces existing tags.
pub async fn generate_tags(
    repo: &dyn DocumentRepository,
    ai: Option<&dyn CompletionService>,
    owner: ObjectId,
    id: ObjectId,
) -> Result<Vec<String>, AppError> {
    let doc = find_owned(repo, owner, id).await?;

    let prompt = format!(
        "Suggest tags for the following document titled \"{}\":\n\n{}",
        doc.title,
        truncate_content(&doc.content)
    );
    let reply = require(ai)?.complete(TAGS_SYSTEM, &prompt, 100).await?;
    let tags = parse_tags(&reply);

    let patch = DocumentPatch {
        tags: Some(tags.clone()),
        ..DocumentPatch::default()
    };
    save_patch(repo, owner, id, patch).await?;
    Ok(tags)
}

/// Search the caller's documents.
///
/// Text-index hits are returned with an excerpt around the first matching
/// term. When there are none and a provider is configured, the most recent
/// documents are judged by the provider instead; a failed judgement only
/// drops that document.
pub async fn search(
    repo: &dyn DocumentRepository,
    ai: Option<&dyn CompletionService>,
    owner: ObjectId,
    query: &str,
) -> Result<Vec<SearchResult>, AppError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::BadRequest("Search query is required".into()));
    }

    let hits = repo
        .find(
            &DocumentFilter::owned_by(owner).matching(query),
            DocumentSort::default(),
        )
        .await?;
    if !hits.is_empty() {
        return Ok(hits
            .iter()
            .take(SEARCH_LIMIT)
            .map(|doc| SearchResult::new(doc, text_snippet(&doc.content, query), None))
            .collect());
    }

    let Some(ai) = ai else {
        return Ok(Vec::new());
    };

    let mut recent = repo
        .find(&DocumentFilter::owned_by(owner), DocumentSort::default())
        .await?;
    recent.truncate(SEMANTIC_CANDIDATES);

    let judgements = recent.iter().map(|doc| async move {
        let excerpt: String = doc.content.chars().take(SEMANTIC_EXCERPT_CHARS).collect();
        let prompt = format!(
            "Query: {query}\n\nDocument: {excerpt}\n\nIs this document relevant to the query? \
             If yes, extract the most relevant snippet (up to 200 characters). Respond in JSON \
             format with 'relevant' (boolean) and 'snippet' (string)."
        );
        match ai.complete(RELEVANCE_SYSTEM, &prompt, 300).await {
            Ok(reply) => Some(parse_relevance(&reply, &excerpt)),
            Err(e) => {
                tracing::warn!("Relevance check failed for document {:?}: {e}", doc.id);
                None
            }
        }
    });

    Ok(recent
        .iter()
        .zip(join_all(judgements).await)
        .filter_map(|(doc, relevance)| {
            relevance
                .filter(|r| r.relevant)
                .map(|r| SearchResult::new(doc, r.snippet, Some(true)))
        })
        .collect())
}

/// Answer a question from a document's content.
pub async fn ask(
    repo: &dyn DocumentRepository,
    ai: Option<&dyn CompletionService>,
    owner: ObjectId,
    id: ObjectId,
    question: &str,
) -> Result<String, AppError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AppError::BadRequest("Question is required".into()));
    }

    let doc = find_owned(repo, owner, id).await?;
    let prompt = format!(
        "Document: {}\n\nQuestion: {question}\n\nPlease answer the question based only on the \
         information provided in the document. If the answer cannot be found in the document, \
         say so.",
        truncate_content(&doc.content)
    );
    require(ai)?.complete(ANSWER_SYSTEM, &prompt, 500).await
}

/// Axum handler for `POST /api/ai/summarize/{id}`.
pub async fn summarize_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<SummaryResponse>, AppError> {
    let id = parse_id(&id, "Document")?;
    let summary = summarize(
        state.document_repo.as_ref(),
        state.completion.as_deref(),
        user.user_id,
        id,
    )
    .await?;
    Ok(Json(SummaryResponse { summary }))
}

/// Axum handler for `POST /api/ai/extract-key-points/{id}`.
pub async fn key_points_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<KeyPointsResponse>, AppError> {
    let id = parse_id(&id, "Document")?;
    let key_points = extract_key_points(
        state.document_repo.as_ref(),
        state.completion.as_deref(),
        user.user_id,
        id,
    )
    .await?;
    Ok(Json(KeyPointsResponse { key_points }))
}

/// Axum handler for `POST /api/ai/generate-tags/{id}`.
pub async fn tags_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<TagsResponse>, AppError> {
    let id = parse_id(&id, "Document")?;
    let tags = generate_tags(
        state.document_repo.as_ref(),
        state.completion.as_deref(),
        user.user_id,
        id,
    )
    .await?;
    Ok(Json(TagsResponse { tags }))
}

/// Axum handler for `POST /api/ai/search`.
pub async fn search_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let results = search(
        state.document_repo.as_ref(),
        state.completion.as_deref(),
        user.user_id,
        &request.query,
    )
    .await?;
    Ok(Json(SearchResponse { results }))
}

/// Axum handler for `POST /api/ai/ask/{id}`.
pub async fn ask_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    let id = parse_id(&id, "Document")?;
    let answer = ask(
        state.document_repo.as_ref(),
        state.completion.as_deref(),
        user.user_id,
        id,
        &request.question,
    )
    .await?;
    Ok(Json(AnswerResponse { answer }))
}
