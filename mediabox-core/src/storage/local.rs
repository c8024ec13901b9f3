use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{
    alternative_name, check_name, media_key, BackendKind, MediaStorage, StorageError,
    StoredObject, MAX_NAME_ATTEMPTS, MEDIA_PREFIX,
};

/// Files on local disk under `<root>/media/`, served by the web app at `/media/`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Directory holding the `media/` namespace.
    pub fn media_dir(&self) -> PathBuf {
        self.root.join(MEDIA_PREFIX.trim_end_matches('/'))
    }

    async fn write_new(&self, path: &Path, content: &[u8]) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;

        let written = async {
            file.write_all(content).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            // Leave no truncated file behind.
            drop(file);
            let _ = fs::remove_file(path).await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl MediaStorage for LocalStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn save(&self, name: &str, content: Vec<u8>) -> Result<String, StorageError> {
        check_name(name)?;

        let dir = self.media_dir();
        fs::create_dir_all(&dir).await?;

        let mut candidate = name.to_string();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = dir.join(&candidate);
            match self.write_new(&path, &content).await {
                Ok(()) => {
                    tracing::debug!(
                        "Local write: path={}, size={} bytes",
                        path.display(),
                        content.len()
                    );
                    return Ok(media_key(&candidate));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = alternative_name(name);
                    tracing::debug!("{} exists, trying {}", path.display(), candidate);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StorageError::NameExhausted(name.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        let dir = self.root.join(&prefix);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let Ok(file_name) = entry.file_name().into_string() else {
                tracing::warn!("Skipping non UTF-8 file name in {}", dir.display());
                continue;
            };

            let last_modified: DateTime<Utc> = metadata.modified()?.into();
            objects.push(StoredObject {
                key: format!("{prefix}{file_name}"),
                last_modified,
                size: metadata.len(),
            });
        }

        tracing::debug!("Local list: dir={}, objects={}", dir.display(), objects.len());
        Ok(objects)
    }

    async fn url_for(&self, key: &str) -> Result<String, StorageError> {
        let path = key
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Ok(format!("/{path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn storage() -> (tempfile::TempDir, LocalStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());
        (dir, storage)
    }

    #[tokio::test]
    async fn save_creates_namespace_directory() {
        let (_dir, storage) = storage();
        assert!(!storage.media_dir().exists());

        let key = storage.save("photo.png", b"png bytes".to_vec()).await.unwrap();

        assert_eq!(key, "media/photo.png");
        let written = std::fs::read(storage.media_dir().join("photo.png")).unwrap();
        assert_eq!(written, b"png bytes");
    }

    #[tokio::test]
    async fn save_never_overwrites() {
        let (dir, storage) = storage();

        let first = storage.save("notes.txt", b"first".to_vec()).await.unwrap();
        let second = storage.save("notes.txt", b"second".to_vec()).await.unwrap();

        assert_eq!(first, "media/notes.txt");
        assert_ne!(first, second);
        assert!(second.starts_with("media/notes_") && second.ends_with(".txt"));
        assert_eq!(
            std::fs::read(storage.media_dir().join("notes.txt")).unwrap(),
            b"first"
        );
        assert_eq!(
            std::fs::read(dir.path().join(&second)).unwrap(),
            b"second"
        );
    }

    #[tokio::test]
    async fn save_rejects_path_traversal() {
        let (_dir, storage) = storage();
        let err = storage.save("../escape.txt", b"x".to_vec()).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));
    }

    #[tokio::test]
    async fn list_missing_namespace_is_empty() {
        let (_dir, storage) = storage();
        assert!(storage.list(MEDIA_PREFIX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_reports_files_only() {
        let (_dir, storage) = storage();
        storage.save("a.txt", b"aaa".to_vec()).await.unwrap();
        std::fs::create_dir_all(storage.media_dir().join("nested")).unwrap();

        let objects = storage.list("media").await.unwrap();

        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].key, "media/a.txt");
        assert_eq!(objects[0].size, 3);
    }

    #[tokio::test]
    async fn list_reports_modification_time() {
        let (_dir, storage) = storage();
        storage.save("old.txt", b"old".to_vec()).await.unwrap();

        let past = SystemTime::now() - Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(storage.media_dir().join("old.txt"))
            .unwrap()
            .set_modified(past)
            .unwrap();

        let objects = storage.list(MEDIA_PREFIX).await.unwrap();
        let drift = objects[0].last_modified - DateTime::<Utc>::from(past);
        assert!(drift.num_seconds().abs() <= 1);
    }

    #[tokio::test]
    async fn url_is_served_from_media_path() {
        let (_dir, storage) = storage();
        assert_eq!(
            storage.url_for("media/photo.png").await.unwrap(),
            "/media/photo.png"
        );
    }

    #[tokio::test]
    async fn url_escapes_reserved_characters() {
        let (_dir, storage) = storage();
        assert_eq!(
            storage.url_for("media/a b#1?.png").await.unwrap(),
            "/media/a%20b%231%3F.png"
        );
    }
}
