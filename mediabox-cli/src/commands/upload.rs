use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use mediabox_core::{storage, MediaStorage, Settings, UploadError, UploadPolicy, UploadedFile};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use walkdir::WalkDir;

/// Files read and sent at the same time. Each one is buffered whole.
const MAX_CONCURRENT_UPLOADS: usize = 4;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: Vec<String>,
    pub skipped: usize,
    pub failed: usize,
}

pub async fn execute(paths: Vec<String>, settings: &Settings) -> Result<()> {
    let storage = storage::connect(settings).await?;
    let policy = UploadPolicy::new(settings.max_upload_size);

    let file_paths = collect_file_paths(paths)?;
    if file_paths.is_empty() {
        anyhow::bail!("No files found in the provided paths");
    }

    println!("Backend: {}", storage.kind());
    println!("Files: {}\n", file_paths.len());

    let summary = upload_all(storage, policy, file_paths).await?;

    println!(
        "✓ Uploaded {} file(s), skipped {}, failed {}",
        summary.uploaded.len(),
        summary.skipped,
        summary.failed
    );
    for key in &summary.uploaded {
        println!("  {key}");
    }

    if summary.failed > 0 {
        anyhow::bail!("{} upload(s) failed", summary.failed);
    }

    Ok(())
}

enum Outcome {
    Stored(String),
    Skipped,
    Failed,
}

async fn upload_all(
    storage: Arc<dyn MediaStorage>,
    policy: UploadPolicy,
    file_paths: Vec<PathBuf>,
) -> Result<UploadSummary> {
    let upload_pb = ProgressBar::new(file_paths.len() as u64);
    upload_pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.green/blue} {pos}/{len} {msg}")
            .expect("Invalid progress bar template")
            .progress_chars("█▓▒░ "),
    );
    upload_pb.set_message("Uploading...");

    let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_UPLOADS));
    let mut upload_tasks = Vec::new();

    for path in file_paths {
        let storage_clone = storage.clone();
        let pb_clone = upload_pb.clone();
        let permits = permits.clone();

        // Spawn upload task, at most MAX_CONCURRENT_UPLOADS run at once
        let task = tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            let outcome = upload_one(storage_clone.as_ref(), policy, &path).await;
            pb_clone.inc(1);
            pb_clone.set_message(format!("Done: {}", path.display()));
            Ok::<_, tokio::sync::AcquireError>(outcome)
        });

        upload_tasks.push(task);
    }

    let mut summary = UploadSummary::default();
    for task in upload_tasks {
        match task.await?? {
            Outcome::Stored(key) => summary.uploaded.push(key),
            Outcome::Skipped => summary.skipped += 1,
            Outcome::Failed => summary.failed += 1,
        }
    }
    summary.uploaded.sort();

    upload_pb.finish_with_message("Upload complete");
    println!();

    Ok(summary)
}

async fn upload_one(storage: &dyn MediaStorage, policy: UploadPolicy, path: &Path) -> Outcome {
    let filename = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    // Refuse oversized files before reading them
    let size = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            tracing::error!("Failed to read {}: {}", path.display(), e);
            return Outcome::Failed;
        }
    };
    if let Err(e) = policy.check_size(size) {
        tracing::warn!("Skipping {}: {}", path.display(), e);
        return Outcome::Skipped;
    }

    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::error!("Failed to read {}: {}", path.display(), e);
            return Outcome::Failed;
        }
    };

    match policy.accept(storage, UploadedFile::new(filename, content)).await {
        Ok(key) => Outcome::Stored(key),
        Err(e @ UploadError::Storage(_)) => {
            tracing::error!("Failed to upload {}: {}", path.display(), e);
            Outcome::Failed
        }
        Err(e) => {
            tracing::warn!("Skipping {}: {}", path.display(), e);
            Outcome::Skipped
        }
    }
}

fn collect_file_paths(paths: Vec<String>) -> Result<Vec<PathBuf>> {
    let mut file_paths = Vec::new();

    for path_str in paths {
        let path = Path::new(&path_str);

        if !path.exists() {
            anyhow::bail!("Path does not exist: {}", path.display());
        }

        if path.is_file() {
            file_paths.push(path.to_path_buf());
        } else if path.is_dir() {
            // Walk directory and collect all files
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() {
                    file_paths.push(entry.into_path());
                }
            }
        }
    }

    // Sort for consistent ordering
    file_paths.sort();

    Ok(file_paths)
}
