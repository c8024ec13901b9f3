use anyhow::{Context, Result};
use mediabox_core::{collect_entries, storage, Settings};

/// Unlike the web gallery, listing errors are reported here.
pub async fn execute(settings: &Settings, json: bool) -> Result<()> {
    let storage = storage::connect(settings).await?;
    let entries = collect_entries(storage.as_ref())
        .await
        .context("Failed to list uploads")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No files uploaded yet.");
    }
    for entry in &entries {
        println!("{}\t{}", entry.name, entry.url);
    }

    Ok(())
}
