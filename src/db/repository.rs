use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Document};
use chrono::{DateTime, Utc};

use crate::db::models::{DocumentRecord, UpdateDocumentRequest};
use crate::error::AppError;

/// Selects documents by owner, identifier, favorite flag and free text.
///
/// Every handler builds its filter from [`DocumentFilter::owned_by`], so a
/// caller can never reach a record belonging to someone else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    pub owner: Option<ObjectId>,
    pub id: Option<ObjectId>,
    pub favorites_only: bool,
    pub text: Option<String>,
}

impl DocumentFilter {
    pub fn owned_by(owner: ObjectId) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn favorites(mut self) -> Self {
        self.favorites_only = true;
        self
    }

    /// Add a text-search clause. Blank queries are ignored.
    pub fn matching(mut self, text: &str) -> Self {
        let text = text.trim();
        self.text = (!text.is_empty()).then(|| text.to_string());
        self
    }

    /// The equivalent MongoDB query document.
    pub fn to_document(&self) -> Document {
        let mut filter = Document::new();
        if let Some(id) = self.id {
            filter.insert("_id", id);
        }
        if let Some(owner) = self.owner {
            filter.insert("owner", owner);
        }
        if self.favorites_only {
            filter.insert("isFavorite", true);
        }
        if let Some(text) = &self.text {
            filter.insert("$text", doc! { "$search": text });
        }
        filter
    }

    /// Evaluate the filter against a record in memory.
    ///
    /// Text matching approximates `$text`: any query term found
    /// (case-insensitively) in the title, content, summary or tags.
    #[cfg(test)]
    pub(crate) fn matches(&self, doc: &DocumentRecord) -> bool {
        if self.id.is_some() && doc.id != self.id {
            return false;
        }
        if self.owner.is_some_and(|owner| owner != doc.owner) {
            return false;
        }
        if self.favorites_only && !doc.is_favorite {
            return false;
        }
        match &self.text {
            None => true,
            Some(text) => {
                let haystack = format!(
                    "{} {} {} {}",
                    doc.title,
                    doc.content,
                    doc.summary.as_deref().unwrap_or_default(),
                    doc.tags.join(" ")
                )
                .to_lowercase();
                text.to_lowercase()
                    .split_whitespace()
                    .any(|term| haystack.contains(term))
            }
        }
    }
}

/// Sortable document fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    FileSize,
}

impl SortField {
    /// Parse the `sortBy` query value; unknown values fall back to `createdAt`.
    pub fn from_query(s: &str) -> Self {
        match s {
            "updatedAt" => SortField::UpdatedAt,
            "title" => SortField::Title,
            "fileSize" => SortField::FileSize,
            _ => SortField::CreatedAt,
        }
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
            SortField::Title => "title",
            SortField::FileSize => "fileSize",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSort {
    pub field: SortField,
    pub descending: bool,
}

impl Default for DocumentSort {
    /// Newest first.
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            descending: true,
        }
    }
}

impl DocumentSort {
    pub fn direction(&self) -> i32 {
        if self.descending {
            -1
        } else {
            1
        }
    }

    pub fn to_document(&self) -> Document {
        let mut sort = Document::new();
        sort.insert(self.field.field_name(), self.direction());
        sort
    }

    #[cfg(test)]
    pub(crate) fn compare(&self, a: &DocumentRecord, b: &DocumentRecord) -> std::cmp::Ordering {
        let ordering = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Title => a.title.cmp(&b.title),
            SortField::FileSize => a.file_size.cmp(&b.file_size),
        };
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Partial update of the mutable document fields.
///
/// `owner`, file metadata and content are deliberately absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_favorite: Option<bool>,
    pub summary: Option<String>,
    pub key_points: Option<Vec<String>>,
}

impl From<UpdateDocumentRequest> for DocumentPatch {
    fn from(req: UpdateDocumentRequest) -> Self {
        Self {
            title: req.title,
            tags: req.tags,
            is_favorite: req.is_favorite,
            ..Self::default()
        }
    }
}

impl DocumentPatch {
    /// The MongoDB `$set` update, stamping `updatedAt`.
    pub fn to_update(&self, now: DateTime<Utc>) -> Result<Document, AppError> {
        let mut set = Document::new();
        if let Some(title) = &self.title {
            set.insert("title", title.as_str());
        }
        if let Some(tags) = &self.tags {
            set.insert("tags", to_bson(tags)?);
        }
        if let Some(is_favorite) = self.is_favorite {
            set.insert("isFavorite", is_favorite);
        }
        if let Some(summary) = &self.summary {
            set.insert("summary", summary.as_str());
        }
        if let Some(key_points) = &self.key_points {
            set.insert("keyPoints", to_bson(key_points)?);
        }
        set.insert("updatedAt", to_bson(&now)?);

        Ok(doc! { "$set": set })
    }

    /// Apply the patch to an in-memory record, stamping `updated_at`.
    #[cfg(test)]
    pub(crate) fn apply(&self, doc: &mut DocumentRecord, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            doc.title = title.clone();
        }
        if let Some(tags) = &self.tags {
            doc.tags = tags.clone();
        }
        if let Some(is_favorite) = self.is_favorite {
            doc.is_favorite = is_favorite;
        }
        if let Some(summary) = &self.summary {
            doc.summary = Some(summary.clone());
        }
        if let Some(key_points) = &self.key_points {
            doc.key_points = key_points.clone();
        }
        doc.updated_at = now;
    }
}

fn to_bson<T: serde::Serialize>(value: &T) -> Result<bson::Bson, AppError> {
    bson::to_bson(value).map_err(|e| AppError::Database(e.to_string()))
}

/// Repository trait for document records.
///
/// This trait allows mocking the database layer in tests.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a new record and return its generated identifier.
    async fn insert(&self, doc: &DocumentRecord) -> Result<ObjectId, AppError>;

    /// All records matching the filter, in sort order.
    async fn find(
        &self,
        filter: &DocumentFilter,
        sort: DocumentSort,
    ) -> Result<Vec<DocumentRecord>, AppError>;

    async fn find_one(&self, filter: &DocumentFilter) -> Result<Option<DocumentRecord>, AppError>;

    /// Apply a patch to the first match and return the updated record.
    async fn update_one(
        &self,
        filter: &DocumentFilter,
        patch: &DocumentPatch,
    ) -> Result<Option<DocumentRecord>, AppError>;

    /// Delete the first match; returns the number of removed records.
    async fn delete_one(&self, filter: &DocumentFilter) -> Result<u64, AppError>;
}

/// MongoDB implementation of the DocumentRepository.
pub struct MongoDocumentRepository {
    collection: mongodb::Collection<DocumentRecord>,
}

impl MongoDocumentRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("documents"),
        }
    }

    /// Create the owner index and the text index used by search.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::IndexModel;

        let indexes = [
            IndexModel::builder().keys(doc! { "owner": 1 }).build(),
            IndexModel::builder()
                .keys(doc! {
                    "title": "text",
                    "content": "text",
                    "summary": "text",
                    "tags": "text",
                })
                .build(),
        ];

        self.collection.create_indexes(indexes).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentRepository for MongoDocumentRepository {
    async fn insert(&self, doc: &DocumentRecord) -> Result<ObjectId, AppError> {
        let result = self.collection.insert_one(doc).await?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::Database("Inserted id is not an ObjectId".into()))
    }

    async fn find(
        &self,
        filter: &DocumentFilter,
        sort: DocumentSort,
    ) -> Result<Vec<DocumentRecord>, AppError> {
        use futures::TryStreamExt;
        use mongodb::options::FindOptions;

        // Text matches rank by relevance first, then by the requested field.
        let mut sort_doc = Document::new();
        if filter.text.is_some() {
            sort_doc.insert("score", doc! { "$meta": "textScore" });
        }
        sort_doc.insert(sort.field.field_name(), sort.direction());

        let options = FindOptions::builder().sort(sort_doc).build();

        let cursor = self
            .collection
            .find(filter.to_document())
            .with_options(options)
            .await?;

        let documents: Vec<DocumentRecord> = cursor.try_collect().await?;
        Ok(documents)
    }

    async fn find_one(&self, filter: &DocumentFilter) -> Result<Option<DocumentRecord>, AppError> {
        Ok(self.collection.find_one(filter.to_document()).await?)
    }

    async fn update_one(
        &self,
        filter: &DocumentFilter,
        patch: &DocumentPatch,
    ) -> Result<Option<DocumentRecord>, AppError> {
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .collection
            .find_one_and_update(filter.to_document(), patch.to_update(Utc::now())?)
            .with_options(options)
            .await?)
    }

    async fn delete_one(&self, filter: &DocumentFilter) -> Result<u64, AppError> {
        let result = self.collection.delete_one(filter.to_document()).await?;
        Ok(result.deleted_count)
    }
}
