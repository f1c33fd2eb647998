use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::models::Role;

/// The closed set of accepted upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Doc,
    Docx,
    Txt,
    Ppt,
    Pptx,
}

impl FileType {
    pub const ALL: [FileType; 6] = [
        FileType::Pdf,
        FileType::Doc,
        FileType::Docx,
        FileType::Txt,
        FileType::Ppt,
        FileType::Pptx,
    ];

    /// Parse a bare extension (no leading dot), case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(FileType::Pdf),
            "doc" => Some(FileType::Doc),
            "docx" => Some(FileType::Docx),
            "txt" => Some(FileType::Txt),
            "ppt" => Some(FileType::Ppt),
            "pptx" => Some(FileType::Pptx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Doc => "doc",
            FileType::Docx => "docx",
            FileType::Txt => "txt",
            FileType::Ppt => "ppt",
            FileType::Pptx => "pptx",
        }
    }

    /// MIME type used when serving the stored file back.
    pub fn content_type(&self) -> &'static str {
        match self {
            FileType::Pdf => "application/pdf",
            FileType::Doc => "application/msword",
            FileType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FileType::Txt => "text/plain; charset=utf-8",
            FileType::Ppt => "application/vnd.ms-powerpoint",
            FileType::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// An uploaded document as stored in the `documents` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    /// Assigned by the repository on insert.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    /// Sanitized client filename, for display only.
    pub original_filename: String,
    pub file_type: FileType,
    pub file_size: u64,
    /// Opaque reference returned by the file store.
    pub file_path: String,
    /// Extracted text or a placeholder.
    pub content: String,
    /// Set once at creation and never reassigned.
    pub owner: ObjectId,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// A fresh, not yet persisted record with default flags and no AI output.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner: ObjectId,
        title: String,
        original_filename: String,
        file_type: FileType,
        file_size: u64,
        file_path: String,
        content: String,
        tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            title,
            original_filename,
            file_type,
            file_size,
            file_path,
            content,
            owner,
            tags,
            is_favorite: false,
            summary: None,
            key_points: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// API form of a document: identifiers rendered as hex strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub original_filename: String,
    pub file_type: FileType,
    pub file_size: u64,
    pub file_path: String,
    pub content: String,
    pub owner: String,
    pub tags: Vec<String>,
    pub is_favorite: bool,
    pub summary: Option<String>,
    pub key_points: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DocumentRecord> for DocumentResponse {
    fn from(doc: DocumentRecord) -> Self {
        Self {
            id: doc.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: doc.title,
            original_filename: doc.original_filename,
            file_type: doc.file_type,
            file_size: doc.file_size,
            file_path: doc.file_path,
            content: doc.content,
            owner: doc.owner.to_hex(),
            tags: doc.tags,
            is_favorite: doc.is_favorite,
            summary: doc.summary,
            key_points: doc.key_points,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

/// Body of `PATCH /api/documents/{id}`. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_favorite: Option<bool>,
}

/// A user account as stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub full_name: String,
    pub email: String,
    #[serde(rename = "password")]
    pub password_hash: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(full_name: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            full_name,
            email,
            password_hash,
            profile_image_url: None,
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }
}

/// API form of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub profile_image_url: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            full_name: user.full_name,
            email: user.email,
            profile_image_url: user.profile_image_url,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> DocumentRecord {
        DocumentRecord::new(
            ObjectId::new(),
            "Quarterly report".to_string(),
            "report.pdf".to_string(),
            FileType::Pdf,
            1024,
            "uploads/5f0c.pdf".to_string(),
            "Revenue grew.".to_string(),
            vec!["finance".to_string()],
        )
    }

    #[test]
    fn test_file_type_from_extension() {
        assert_eq!(FileType::from_extension("PDF"), Some(FileType::Pdf));
        assert_eq!(FileType::from_extension("pptx"), Some(FileType::Pptx));
        assert_eq!(FileType::from_extension("exe"), None);
        assert_eq!(FileType::from_extension(""), None);
        for ty in FileType::ALL {
            assert_eq!(FileType::from_extension(ty.extension()), Some(ty));
        }
    }

    #[test]
    fn test_new_document_defaults() {
        let doc = sample_document();
        assert!(doc.id.is_none());
        assert!(!doc.is_favorite);
        assert!(doc.summary.is_none());
        assert!(doc.key_points.is_empty());
        assert_eq!(doc.created_at, doc.updated_at);
    }

    #[test]
    fn test_document_stored_field_names() {
        let json = serde_json::to_value(sample_document()).unwrap();
        assert_eq!(json["fileType"], "pdf");
        assert_eq!(json["originalFilename"], "report.pdf");
        assert_eq!(json["isFavorite"], false);
        assert!(json["keyPoints"].as_array().unwrap().is_empty());
        assert!(json.get("_id").is_none());
    }

    #[test]
    fn test_document_response_uses_string_ids() {
        let mut doc = sample_document();
        let id = ObjectId::new();
        doc.id = Some(id);
        let owner = doc.owner;

        let json = serde_json::to_value(DocumentResponse::from(doc)).unwrap();
        assert_eq!(json["_id"], id.to_hex());
        assert_eq!(json["owner"], owner.to_hex());
    }

    #[test]
    fn test_user_response_hides_password() {
        let mut user = UserRecord::new(
            "Ada Lovelace".to_string(),
            "ada@example.com".to_string(),
            "pbkdf2-sha256$1$AAAA$AAAA".to_string(),
        );
        user.id = Some(ObjectId::new());

        let json = serde_json::to_string(&UserResponse::from(user)).unwrap();
        assert!(!json.contains("password"));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn test_update_request_ignores_unknown_fields() {
        let json = r#"{"title": "New", "owner": "someone-else", "isFavorite": true}"#;
        let req: UpdateDocumentRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.title.as_deref(), Some("New"));
        assert_eq!(req.is_favorite, Some(true));
        assert!(req.tags.is_none());
    }
}
