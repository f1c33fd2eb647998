use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::AppError;

/// Trait for raw upload storage.
///
/// Abstracted as a trait so tests can use a mock without touching disk or S3.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store bytes under `name` and return an opaque path for later access.
    async fn save(&self, name: &str, content: Vec<u8>) -> Result<String, AppError>;

    /// Retrieve content by path. Returns `None` if nothing is stored there.
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, AppError>;

    /// Size in bytes of the stored content.
    async fn size_of(&self, path: &str) -> Result<u64, AppError>;

    /// Delete stored content. `Ok(false)` means there was nothing to delete.
    async fn remove(&self, path: &str) -> Result<bool, AppError>;
}

/// Storage names are generated server-side; anything that could escape the
/// store root is refused outright.
fn validate_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(AppError::Storage(format!("Invalid storage name '{name}'")));
    }
    Ok(())
}

/// Local filesystem implementation of FileStore.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Open (and create if needed) the upload directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create upload directory '{}': {e}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, name: &str, content: Vec<u8>) -> Result<String, AppError> {
        validate_name(name)?;
        let path = self.root.join(name);

        tokio::fs::write(&path, content).await.map_err(|e| {
            AppError::Storage(format!("Failed to write '{}': {e}", path.display()))
        })?;

        Ok(path.to_string_lossy().into_owned())
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, AppError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!("Failed to read '{path}': {e}"))),
        }
    }

    async fn size_of(&self, path: &str) -> Result<u64, AppError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to stat '{path}': {e}")))?;
        Ok(metadata.len())
    }

    async fn remove(&self, path: &str) -> Result<bool, AppError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Storage(format!("Failed to delete '{path}': {e}"))),
        }
    }
}

/// S3 implementation of FileStore.
///
/// Paths are object keys under the `uploads/` prefix.
pub struct S3FileStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3FileStore {
    /// Create an S3 file store from the ambient AWS configuration.
    ///
    /// `endpoint` overrides the service URL (for MinIO, LocalStack, etc.).
    pub async fn connect(bucket: String, endpoint: Option<&str>) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(endpoint) = endpoint {
            config_loader = config_loader.endpoint_url(endpoint);
        }

        let sdk_config = config_loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(endpoint.is_some())
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket,
        }
    }

    /// Create with explicit values (useful for testing / DI).
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    async fn save(&self, name: &str, content: Vec<u8>) -> Result<String, AppError> {
        validate_name(name)?;
        let key = format!("uploads/{name}");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(content.into())
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to put object '{key}': {e}")))?;

        Ok(key)
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, AppError> {
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::Storage(format!("Failed to read body: {e}")))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(AppError::Storage(format!(
                        "Failed to get object '{path}': {service_err}"
                    )))
                }
            }
        }
    }

    async fn size_of(&self, path: &str) -> Result<u64, AppError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to stat object '{path}': {e}")))?;

        Ok(output.content_length().unwrap_or_default().max(0) as u64)
    }

    async fn remove(&self, path: &str) -> Result<bool, AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete object '{path}': {e}")))?;

        Ok(true)
    }
}
