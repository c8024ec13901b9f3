use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::{
    config::Region, presigning::PresigningConfig, primitives::ByteStream, types::Object, Client,
};
use chrono::DateTime;

use super::{
    alternative_name, check_name, media_key, BackendKind, MediaStorage, StorageError,
    StoredObject, MAX_NAME_ATTEMPTS,
};

/// Lifetime of the signed links handed out for private objects.
const PRESIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// Private objects in an S3 (or S3-compatible) bucket.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub async fn new(bucket: String, region: String) -> Result<Self, StorageError> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region));

        // If AWS_ENDPOINT_URL is set, use it (for MinIO/LocalStack/etc)
        let endpoint_url = std::env::var("AWS_ENDPOINT_URL").ok();
        if let Some(endpoint_url) = &endpoint_url {
            config_loader = config_loader.endpoint_url(endpoint_url);
        }

        let config = config_loader.load().await;
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&config);

        // For S3-compatible services, force path-style addressing
        if endpoint_url.is_some() {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        Ok(Self::from_conf(s3_config_builder.build(), bucket))
    }

    pub fn from_conf(config: aws_sdk_s3::Config, bucket: String) -> Self {
        Self {
            client: Client::from_conf(config),
            bucket,
        }
    }

    /// Upload bytes to S3
    async fn put_bytes(&self, data: Vec<u8>, s3_key: &str) -> Result<(), StorageError> {
        tracing::debug!(
            "S3 PUT: bucket={}, key={}, size={} bytes",
            self.bucket,
            s3_key,
            data.len()
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(s3_key)
            .body(ByteStream::from(data))
            .content_type(guess_content_type(s3_key))
            .send()
            .await
            .map_err(StorageError::remote)?;

        tracing::debug!("S3 PUT success: key={}", s3_key);
        Ok(())
    }

    /// Check if object exists. Anything but a clean 404 is an error.
    async fn object_exists(&self, s3_key: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(s3_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(StorageError::remote(e)),
        }
    }

    async fn available_key(&self, name: &str) -> Result<String, StorageError> {
        let mut candidate = name.to_string();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let key = media_key(&candidate);
            if !self.object_exists(&key).await? {
                return Ok(key);
            }
            candidate = alternative_name(name);
            tracing::debug!("S3 key {} taken, trying {}", key, candidate);
        }
        Err(StorageError::NameExhausted(name.to_string()))
    }
}

#[async_trait]
impl MediaStorage for S3Storage {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn save(&self, name: &str, content: Vec<u8>) -> Result<String, StorageError> {
        check_name(name)?;
        let key = self.available_key(name).await?;
        self.put_bytes(content, &key).await?;
        Ok(key)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        tracing::debug!("S3 LIST: bucket={}, prefix={}", self.bucket, prefix);

        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix);
            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(StorageError::remote)?;
            for object in response.contents.unwrap_or_default() {
                if let Some(stored) = stored_object(&prefix, object)? {
                    objects.push(stored);
                }
            }

            continuation_token = response.next_continuation_token;
            if continuation_token.is_none() {
                break;
            }
        }

        tracing::debug!("S3 LIST success: prefix={}, objects={}", prefix, objects.len());
        Ok(objects)
    }

    async fn url_for(&self, key: &str) -> Result<String, StorageError> {
        let presigning =
            PresigningConfig::expires_in(PRESIGNED_URL_TTL).map_err(StorageError::remote)?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(StorageError::remote)?;
        Ok(request.uri().to_string())
    }
}

/// Convert one listing entry. The directory marker and nested keys are skipped.
fn stored_object(prefix: &str, object: Object) -> Result<Option<StoredObject>, StorageError> {
    let key = object
        .key
        .ok_or_else(|| StorageError::Metadata("listed object has no key".to_string()))?;

    let name = key.strip_prefix(prefix).unwrap_or(&key);
    if name.is_empty() || name.contains('/') {
        return Ok(None);
    }

    let modified = object
        .last_modified
        .ok_or_else(|| StorageError::Metadata(format!("{key} has no last-modified time")))?;
    let last_modified = DateTime::from_timestamp(modified.secs(), modified.subsec_nanos())
        .ok_or_else(|| StorageError::Metadata(format!("{key} has an out of range timestamp")))?;

    let size = u64::try_from(object.size.unwrap_or_default()).unwrap_or_default();

    Ok(Some(StoredObject {
        key,
        last_modified,
        size,
    }))
}

fn guess_content_type(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{retry::RetryConfig, BehaviorVersion, Credentials};
    use aws_sdk_s3::primitives::DateTime as SmithyDateTime;

    fn offline_storage(endpoint: Option<&str>) -> S3Storage {
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("AKIDTEST", "secret", None, None, "test"))
            .retry_config(RetryConfig::disabled());
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        S3Storage::from_conf(builder.build(), "uploads".to_string())
    }

    fn object(key: Option<&str>, secs: Option<i64>) -> Object {
        Object::builder()
            .set_key(key.map(str::to_string))
            .set_last_modified(secs.map(SmithyDateTime::from_secs))
            .size(42)
            .build()
    }

    #[test]
    fn converts_listing_entries() {
        let stored = stored_object("media/", object(Some("media/photo.png"), Some(1_700_000_000)))
            .unwrap()
            .unwrap();
        assert_eq!(stored.key, "media/photo.png");
        assert_eq!(stored.size, 42);
        assert_eq!(stored.last_modified.timestamp(), 1_700_000_000);
    }

    #[test]
    fn skips_directory_marker_and_nested_keys() {
        assert!(stored_object("media/", object(Some("media/"), Some(1)))
            .unwrap()
            .is_none());
        assert!(stored_object("media/", object(Some("media/sub/a.png"), Some(1)))
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_metadata_is_an_error() {
        assert!(matches!(
            stored_object("media/", object(None, Some(1))),
            Err(StorageError::Metadata(_))
        ));
        assert!(matches!(
            stored_object("media/", object(Some("media/a.png"), None)),
            Err(StorageError::Metadata(_))
        ));
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(guess_content_type("media/a.JPG"), "image/jpeg");
        assert_eq!(guess_content_type("media/a.png"), "image/png");
        assert_eq!(guess_content_type("media/report.pdf"), "application/pdf");
        assert_eq!(guess_content_type("media/blob"), "application/octet-stream");
    }

    #[tokio::test]
    async fn url_is_presigned() {
        let storage = offline_storage(None);
        assert_eq!(storage.kind(), BackendKind::Remote);

        let url = storage.url_for("media/photo.png").await.unwrap();

        assert!(url.starts_with("https://"));
        assert!(url.contains("uploads"));
        assert!(url.contains("media/photo.png"));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_listing_and_saving() {
        let storage = offline_storage(Some("http://127.0.0.1:1"));

        assert!(matches!(
            storage.list("media/").await,
            Err(StorageError::Remote(_))
        ));
        assert!(matches!(
            storage.save("photo.png", b"data".to_vec()).await,
            Err(StorageError::Remote(_))
        ));
    }
}
