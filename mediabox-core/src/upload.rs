use thiserror::Error;

use crate::storage::{MediaStorage, StorageError};

/// Longest stored name. Leaves room for the `_xxxxxxx` collision suffix
/// within the usual 255 byte file name limit.
const MAX_NAME_LEN: usize = 200;

/// A file received from a client, alive for a single request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            original_name: original_name.into(),
            content,
        }
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file was submitted.")]
    Missing,

    #[error("The submitted file is empty.")]
    Empty,

    #[error("File size cannot exceed {}.", format_size(*.max))]
    TooLarge { max: u64 },

    #[error("Invalid file name.")]
    InvalidName,

    #[error("failed to store upload: {0}")]
    Storage(#[from] StorageError),
}

impl UploadError {
    /// Rejections caused by the submitted input, as opposed to backend failures.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

/// Size policy applied to every upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    max_size: u64,
}

impl UploadPolicy {
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn check_size(&self, size: u64) -> Result<(), UploadError> {
        if size > self.max_size {
            return Err(UploadError::TooLarge { max: self.max_size });
        }
        Ok(())
    }

    /// Validate `file` and return the name it should be stored under.
    pub fn validate(&self, file: &UploadedFile) -> Result<String, UploadError> {
        if file.original_name.trim().is_empty() {
            return Err(UploadError::Missing);
        }
        if file.content.is_empty() {
            return Err(UploadError::Empty);
        }
        self.check_size(file.size())?;
        sanitize_name(&file.original_name).ok_or(UploadError::InvalidName)
    }

    /// Validate and persist `file`, returning the stored key.
    pub async fn accept(
        &self,
        storage: &dyn MediaStorage,
        file: UploadedFile,
    ) -> Result<String, UploadError> {
        let name = self.validate(&file)?;
        let size = file.size();
        let key = storage.save(&name, file.content).await?;
        tracing::info!(
            "Stored upload: original={}, key={}, size={} bytes",
            file.original_name,
            key,
            size
        );
        Ok(key)
    }
}

/// Reduce a client supplied file name to a safe single path segment.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    let name: String = base
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();

    if matches!(name.as_str(), "" | "." | "..") {
        return None;
    }
    shorten_name(name)
}

/// Truncate the stem of an overlong name, keeping its extension. `None` when
/// the extension alone does not fit.
fn shorten_name(name: String) -> Option<String> {
    if name.len() <= MAX_NAME_LEN {
        return Some(name);
    }

    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name.as_str(), ""),
    };
    if ext.len() >= MAX_NAME_LEN {
        return None;
    }

    // Only ASCII survives sanitation, so any byte index is a char boundary.
    let keep = (MAX_NAME_LEN - ext.len()).min(stem.len());
    Some(format!("{}{}", &stem[..keep], ext))
}

/// Human readable byte count (`10485760` -> `10 MB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["bytes", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 || value.fract() == 0.0 {
        format!("{} {}", value as u64, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
