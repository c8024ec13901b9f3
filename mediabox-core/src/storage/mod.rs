//! Storage backends for uploaded media.
//!
//! Every backend keeps objects under the `media/` namespace and refuses to
//! overwrite: a name that is already taken is saved under an alternative
//! name and the resolved key is returned to the caller.

mod local;
mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{Settings, StorageSettings};

pub use local::LocalStorage;
pub use s3::S3Storage;

/// Prefix shared by every stored object key.
pub const MEDIA_PREFIX: &str = "media/";

/// Attempts at finding a free name before a save gives up.
const MAX_NAME_ATTEMPTS: usize = 16;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object store request failed: {0}")]
    Remote(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("malformed object metadata: {0}")]
    Metadata(String),

    #[error("invalid object name: {0:?}")]
    InvalidName(String),

    #[error("no available name for {0:?}")]
    NameExhausted(String),
}

impl StorageError {
    pub(crate) fn remote<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Remote(Box::new(err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// A persisted upload as reported by its backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

/// Capability shared by the local and remote backends.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Persist `content` as `media/<name>` without overwriting, returning the
    /// key actually written.
    async fn save(&self, name: &str, content: Vec<u8>) -> Result<String, StorageError>;

    /// Every object directly under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError>;

    /// A URL a browser can fetch the object from.
    async fn url_for(&self, key: &str) -> Result<String, StorageError>;
}

/// Build the backend selected by `settings`. Called once at startup.
pub async fn connect(settings: &Settings) -> Result<Arc<dyn MediaStorage>, StorageError> {
    match &settings.storage {
        StorageSettings::Local { media_root } => {
            tracing::info!("Using local storage at {}", media_root.display());
            Ok(Arc::new(LocalStorage::new(media_root.clone())))
        }
        StorageSettings::Remote { bucket, region } => {
            tracing::info!("Using remote storage: bucket={}, region={}", bucket, region);
            let storage = S3Storage::new(bucket.clone(), region.clone()).await?;
            Ok(Arc::new(storage))
        }
    }
}

pub fn media_key(name: &str) -> String {
    format!("{MEDIA_PREFIX}{name}")
}

/// Final path segment of a key (`media/a.png` -> `a.png`).
pub fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// `photo.png` -> `photo_<7 random chars>.png`.
pub(crate) fn alternative_name(name: &str) -> String {
    let suffix = &Uuid::new_v4().simple().to_string()[..7];
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{}{}", &name[..dot], suffix, &name[dot..]),
        _ => format!("{name}_{suffix}"),
    }
}

/// Names a backend will accept: a single non-empty path segment.
pub(crate) fn check_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
