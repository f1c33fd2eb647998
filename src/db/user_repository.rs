use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Document};
use chrono::{DateTime, Utc};

use crate::auth::models::Role;
use crate::db::models::UserRecord;
use crate::error::AppError;

/// Partial update of a user account.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub profile_image_url: Option<String>,
    pub password_hash: Option<String>,
}

impl UserPatch {
    /// The MongoDB `$set` update, stamping `updatedAt`.
    pub fn to_update(&self, now: DateTime<Utc>) -> Result<Document, AppError> {
        let mut set = Document::new();
        if let Some(full_name) = &self.full_name {
            set.insert("fullName", full_name.as_str());
        }
        if let Some(email) = &self.email {
            set.insert("email", email.as_str());
        }
        if let Some(role) = self.role {
            set.insert("role", role.to_string());
        }
        if let Some(url) = &self.profile_image_url {
            set.insert("profileImageUrl", url.as_str());
        }
        if let Some(hash) = &self.password_hash {
            set.insert("password", hash.as_str());
        }
        set.insert(
            "updatedAt",
            bson::to_bson(&now).map_err(|e| AppError::Database(e.to_string()))?,
        );

        Ok(doc! { "$set": set })
    }

    /// Apply the patch to an in-memory record, stamping `updated_at`.
    #[cfg(test)]
    pub(crate) fn apply(&self, user: &mut UserRecord, now: DateTime<Utc>) {
        if let Some(full_name) = &self.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(url) = &self.profile_image_url {
            user.profile_image_url = Some(url.clone());
        }
        if let Some(hash) = &self.password_hash {
            user.password_hash = hash.clone();
        }
        user.updated_at = now;
    }
}

/// Repository trait for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: &UserRecord) -> Result<ObjectId, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<UserRecord>, AppError>;

    async fn find_all(&self) -> Result<Vec<UserRecord>, AppError>;

    /// Apply a patch and return the updated account.
    async fn update_one(
        &self,
        id: ObjectId,
        patch: &UserPatch,
    ) -> Result<Option<UserRecord>, AppError>;

    async fn delete_one(&self, id: ObjectId) -> Result<u64, AppError>;
}

/// MongoDB implementation of the UserRepository.
pub struct MongoUserRepository {
    collection: mongodb::Collection<UserRecord>,
}

impl MongoUserRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }

    /// Email addresses are unique across accounts.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.collection.create_index(index).await?;
        Ok(())
    }
}

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    /// A concurrent registration that loses the race on the unique email
    /// index surfaces as the same error as the upfront existence check.
    async fn insert(&self, user: &UserRecord) -> Result<ObjectId, AppError> {
        let result = self.collection.insert_one(user).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::BadRequest("User already exists".into())
            } else {
                AppError::from(e)
            }
        })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::Database("Inserted id is not an ObjectId".into()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.collection.find_one(doc! { "email": email }).await?)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<UserRecord>, AppError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_all(&self) -> Result<Vec<UserRecord>, AppError> {
        use futures::TryStreamExt;

        let cursor = self.collection.find(doc! {}).await?;
        let users: Vec<UserRecord> = cursor.try_collect().await?;
        Ok(users)
    }

    async fn update_one(
        &self,
        id: ObjectId,
        patch: &UserPatch,
    ) -> Result<Option<UserRecord>, AppError> {
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        Ok(self
            .collection
            .find_one_and_update(doc! { "_id": id }, patch.to_update(Utc::now())?)
            .with_options(options)
            .await?)
    }

    async fn delete_one(&self, id: ObjectId) -> Result<u64, AppError> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count)
    }
}
