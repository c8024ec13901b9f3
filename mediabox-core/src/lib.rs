pub mod config;
pub mod gallery;
pub mod storage;
pub mod upload;

pub use config::{ConfigError, Settings, StorageSettings};
pub use gallery::{collect_entries, GalleryEntry};
pub use storage::{BackendKind, LocalStorage, MediaStorage, S3Storage, StorageError, StoredObject};
pub use upload::{UploadError, UploadPolicy, UploadedFile};
