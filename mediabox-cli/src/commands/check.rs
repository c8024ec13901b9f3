use anyhow::{Context, Result};
use mediabox_core::{storage, Settings, StorageSettings};

pub async fn execute(settings: &Settings) -> Result<()> {
    match &settings.storage {
        StorageSettings::Local { media_root } => {
            println!("Backend: local ({})", media_root.display());
        }
        StorageSettings::Remote { bucket, region } => {
            println!("Backend: remote (bucket {bucket}, region {region})");
        }
    }

    let storage = storage::connect(settings).await?;
    let objects = storage
        .list(storage::MEDIA_PREFIX)
        .await
        .context("Storage backend is not reachable")?;

    println!("✓ {} storage reachable", storage.kind());
    println!("Objects under {}: {}", storage::MEDIA_PREFIX, objects.len());

    Ok(())
}
