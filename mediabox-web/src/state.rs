use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use mediabox_core::{storage, LocalStorage, MediaStorage, Settings, StorageSettings, UploadPolicy};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn MediaStorage>,
    pub policy: UploadPolicy,
    /// Set when files live on local disk and must be served by this process.
    pub media_dir: Option<PathBuf>,
}

impl AppState {
    pub async fn new(settings: &Settings) -> Result<Self> {
        let storage = storage::connect(settings).await?;
        let media_dir = match &settings.storage {
            StorageSettings::Local { media_root } => {
                Some(LocalStorage::new(media_root.clone()).media_dir())
            }
            StorageSettings::Remote { .. } => None,
        };

        Ok(Self {
            storage,
            policy: UploadPolicy::new(settings.max_upload_size),
            media_dir,
        })
    }
}
