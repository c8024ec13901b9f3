use std::path::PathBuf;

use thiserror::Error;

/// Upload ceiling used when `MAX_UPLOAD_SIZE_BYTES` is unset (500 MB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 500 * 1024 * 1024;

pub const USE_REMOTE_STORAGE: &str = "USE_REMOTE_STORAGE";
pub const STORAGE_BUCKET_NAME: &str = "STORAGE_BUCKET_NAME";
pub const STORAGE_REGION: &str = "STORAGE_REGION";
pub const MAX_UPLOAD_SIZE_BYTES: &str = "MAX_UPLOAD_SIZE_BYTES";
pub const LOCAL_MEDIA_ROOT: &str = "LOCAL_MEDIA_ROOT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when USE_REMOTE_STORAGE is enabled")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Where uploaded files are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageSettings {
    Local { media_root: PathBuf },
    Remote { bucket: String, region: String },
}

/// Process-wide configuration, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub storage: StorageSettings,
    pub max_upload_size: u64,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let use_remote = match get(USE_REMOTE_STORAGE) {
            Some(raw) => parse_bool(USE_REMOTE_STORAGE, &raw)?,
            None => false,
        };

        let max_upload_size = match get(MAX_UPLOAD_SIZE_BYTES) {
            Some(raw) => {
                let size = raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                    key: MAX_UPLOAD_SIZE_BYTES,
                    value: raw.clone(),
                    reason: "expected a number of bytes",
                })?;
                if size == 0 {
                    return Err(ConfigError::Invalid {
                        key: MAX_UPLOAD_SIZE_BYTES,
                        value: raw,
                        reason: "must be greater than zero",
                    });
                }
                size
            }
            None => DEFAULT_MAX_UPLOAD_SIZE,
        };

        let storage = if use_remote {
            StorageSettings::Remote {
                bucket: get(STORAGE_BUCKET_NAME)
                    .ok_or(ConfigError::Missing(STORAGE_BUCKET_NAME))?,
                region: get(STORAGE_REGION).ok_or(ConfigError::Missing(STORAGE_REGION))?,
            }
        } else {
            StorageSettings::Local {
                media_root: get(LOCAL_MEDIA_ROOT)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(".")),
            }
        };

        Ok(Self {
            storage,
            max_upload_size,
        })
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "expected a boolean",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_to_local_storage() {
        let settings = settings(&[]).unwrap();
        assert_eq!(
            settings.storage,
            StorageSettings::Local {
                media_root: PathBuf::from(".")
            }
        );
        assert_eq!(settings.max_upload_size, DEFAULT_MAX_UPLOAD_SIZE);
    }

    #[test]
    fn remote_storage_requires_bucket_and_region() {
        let err = settings(&[(USE_REMOTE_STORAGE, "true")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing(STORAGE_BUCKET_NAME));

        let err = settings(&[(USE_REMOTE_STORAGE, "True"), (STORAGE_BUCKET_NAME, "uploads")])
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing(STORAGE_REGION));

        let settings = settings(&[
            (USE_REMOTE_STORAGE, "1"),
            (STORAGE_BUCKET_NAME, "uploads"),
            (STORAGE_REGION, "us-east-2"),
        ])
        .unwrap();
        assert_eq!(
            settings.storage,
            StorageSettings::Remote {
                bucket: "uploads".into(),
                region: "us-east-2".into()
            }
        );
    }

    #[test]
    fn bucket_is_ignored_for_local_storage() {
        let settings = settings(&[
            (USE_REMOTE_STORAGE, "off"),
            (STORAGE_BUCKET_NAME, "uploads"),
            (LOCAL_MEDIA_ROOT, "/srv/mediabox"),
        ])
        .unwrap();
        assert_eq!(
            settings.storage,
            StorageSettings::Local {
                media_root: PathBuf::from("/srv/mediabox")
            }
        );
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(matches!(
            settings(&[(USE_REMOTE_STORAGE, "maybe")]),
            Err(ConfigError::Invalid { key: USE_REMOTE_STORAGE, .. })
        ));
        assert!(matches!(
            settings(&[(MAX_UPLOAD_SIZE_BYTES, "10MB")]),
            Err(ConfigError::Invalid { key: MAX_UPLOAD_SIZE_BYTES, .. })
        ));
        assert!(matches!(
            settings(&[(MAX_UPLOAD_SIZE_BYTES, "0")]),
            Err(ConfigError::Invalid { key: MAX_UPLOAD_SIZE_BYTES, .. })
        ));
    }

    #[test]
    fn custom_ceiling() {
        let settings = settings(&[(MAX_UPLOAD_SIZE_BYTES, "10485760")]).unwrap();
        assert_eq!(settings.max_upload_size, 10 * 1024 * 1024);
    }
}
