use serde::Serialize;

use crate::storage::{base_name, MediaStorage, StorageError, MEDIA_PREFIX};

/// Files whose name starts with this never show up in the gallery.
pub const RESERVED_PREFIX: &str = "test";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryEntry {
    pub name: String,
    pub url: String,
}

/// Current uploads, newest first, without reserved entries.
///
/// Any backend failure aborts the whole listing; callers decide whether to
/// degrade or report it.
pub async fn collect_entries(storage: &dyn MediaStorage) -> Result<Vec<GalleryEntry>, StorageError> {
    let mut objects = storage.list(MEDIA_PREFIX).await?;
    objects.retain(|object| !base_name(&object.key).starts_with(RESERVED_PREFIX));
    objects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));

    let mut entries = Vec::with_capacity(objects.len());
    for object in objects {
        let url = storage.url_for(&object.key).await?;
        entries.push(GalleryEntry {
            name: base_name(&object.key).to_string(),
            url,
        });
    }
    Ok(entries)
}
