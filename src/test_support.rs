//! In-memory repositories and file store shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::Utc;

use crate::db::models::{DocumentRecord, UserRecord};
use crate::db::repository::{DocumentFilter, DocumentPatch, DocumentRepository, DocumentSort};
use crate::db::user_repository::{UserPatch, UserRepository};
use crate::error::AppError;
use crate::storage::client::FileStore;

#[derive(Default)]
pub struct MockRepo {
    pub documents: Mutex<Vec<DocumentRecord>>,
    pub fail_insert: AtomicBool,
}

impl MockRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_inserts() -> Self {
        let repo = Self::default();
        repo.fail_insert.store(true, Ordering::SeqCst);
        repo
    }

    pub fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentRepository for MockRepo {
    async fn insert(&self, doc: &DocumentRecord) -> Result<ObjectId, AppError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(AppError::Database("insert rejected".into()));
        }
        let id = ObjectId::new();
        let mut doc = doc.clone();
        doc.id = Some(id);
        self.documents.lock().unwrap().push(doc);
        Ok(id)
    }

    async fn find(
        &self,
        filter: &DocumentFilter,
        sort: DocumentSort,
    ) -> Result<Vec<DocumentRecord>, AppError> {
        let mut docs: Vec<DocumentRecord> = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        docs.sort_by(|a, b| sort.compare(a, b));
        Ok(docs)
    }

    async fn find_one(&self, filter: &DocumentFilter) -> Result<Option<DocumentRecord>, AppError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .find(|d| filter.matches(d))
            .cloned())
    }

    async fn update_one(
        &self,
        filter: &DocumentFilter,
        patch: &DocumentPatch,
    ) -> Result<Option<DocumentRecord>, AppError> {
        let mut docs = self.documents.lock().unwrap();
        Ok(docs.iter_mut().find(|d| filter.matches(d)).map(|doc| {
            patch.apply(doc, Utc::now());
            doc.clone()
        }))
    }

    async fn delete_one(&self, filter: &DocumentFilter) -> Result<u64, AppError> {
        let mut docs = self.documents.lock().unwrap();
        match docs.iter().position(|d| filter.matches(d)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[derive(Default)]
pub struct MockUserRepo {
    pub users: Mutex<Vec<UserRecord>>,
}

impl MockUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MockUserRepo {
    async fn insert(&self, user: &UserRecord) -> Result<ObjectId, AppError> {
        let id = ObjectId::new();
        let mut user = user.clone();
        user.id = Some(id);
        self.users.lock().unwrap().push(user);
        Ok(id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<UserRecord>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == Some(id))
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<UserRecord>, AppError> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn update_one(
        &self,
        id: ObjectId,
        patch: &UserPatch,
    ) -> Result<Option<UserRecord>, AppError> {
        let mut users = self.users.lock().unwrap();
        Ok(users.iter_mut().find(|u| u.id == Some(id)).map(|user| {
            patch.apply(user, Utc::now());
            user.clone()
        }))
    }

    async fn delete_one(&self, id: ObjectId) -> Result<u64, AppError> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != Some(id));
        Ok((before - users.len()) as u64)
    }
}

#[derive(Default)]
pub struct MockStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub saves: AtomicUsize,
    pub removals: AtomicUsize,
    pub fail_remove: AtomicBool,
    pub fail_size: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_removals() -> Self {
        let store = Self::default();
        store.fail_remove.store(true, Ordering::SeqCst);
        store
    }

    pub fn failing_size_lookups() -> Self {
        let store = Self::default();
        store.fail_size.store(true, Ordering::SeqCst);
        store
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }
}

#[async_trait]
impl FileStore for MockStore {
    async fn save(&self, name: &str, content: Vec<u8>) -> Result<String, AppError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let path = format!("mem/{name}");
        self.objects.lock().unwrap().insert(path.clone(), content);
        Ok(path)
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self.objects.lock().unwrap().get(path).cloned())
    }

    async fn size_of(&self, path: &str) -> Result<u64, AppError> {
        if self.fail_size.load(Ordering::SeqCst) {
            return Err(AppError::Storage("stat failed".into()));
        }
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|bytes| bytes.len() as u64)
            .ok_or_else(|| AppError::Storage(format!("'{path}' not found")))
    }

    async fn remove(&self, path: &str) -> Result<bool, AppError> {
        self.removals.fetch_add(1, Ordering::SeqCst);
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(AppError::Storage("disk unavailable".into()));
        }
        Ok(self.objects.lock().unwrap().remove(path).is_some())
    }
}
