use std::collections::HashMap;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Where uploaded bytes are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
}

/// Process configuration, read once at startup.
///
/// Every key can be set through a `DOCMIND_`-prefixed environment variable,
/// e.g. `DOCMIND_JWT_SECRET` or `DOCMIND_STORAGE_BACKEND=s3`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub storage_backend: StorageBackend,
    #[serde(default)]
    pub s3_bucket: Option<String>,
    #[serde(default)]
    pub s3_endpoint: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    pub openai_model: String,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(Environment::with_prefix("DOCMIND"))
    }

    /// Load from an explicit variable map instead of the process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::build(Environment::with_prefix("DOCMIND").source(Some(vars)))
    }

    fn build(env: Environment) -> Result<Self, ConfigError> {
        let config: AppConfig = Config::builder()
            .set_default("bind_addr", "0.0.0.0:5000")?
            .set_default("mongodb_uri", "mongodb://localhost:27017")?
            .set_default("mongodb_database", "docmind")?
            .set_default("token_ttl_hours", 168)?
            .set_default("upload_dir", "uploads")?
            .set_default("max_upload_bytes", 10 * 1024 * 1024)?
            .set_default("storage_backend", "local")?
            .set_default("openai_model", "gpt-3.5-turbo")?
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message("jwt_secret must not be empty".into()));
        }
        if self.storage_backend == StorageBackend::S3 && self.s3_bucket.is_none() {
            return Err(ConfigError::Message(
                "s3_bucket is required when storage_backend is s3".into(),
            ));
        }
        Ok(())
    }
}
