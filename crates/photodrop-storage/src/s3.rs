use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use photodrop_core::{S3Settings, StorageKey};
use tokio::io::AsyncReadExt;

use crate::traits::{ObjectMetadata, ObjectStorage, StorageError, StorageResult, StoredObject};

/// S3 storage implementation for S3-compatible providers
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    endpoint: String,
}

impl S3Storage {
    /// Create a new S3Storage from fully resolved connection settings.
    ///
    /// The SDK's own retries are disabled: the upload executor owns the retry policy.
    /// Path-style addressing is always used (`{endpoint}/{bucket}/{key}`), as required
    /// by MinIO and most S3-compatible providers.
    pub fn new(settings: &S3Settings) -> StorageResult<Self> {
        if settings.bucket.trim().is_empty() {
            return Err(StorageError::ConfigError("bucket name is empty".to_string()));
        }

        let endpoint = normalize_endpoint(&settings.endpoint)?;

        let credentials = Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            None,
            None,
            "photodrop-env",
        );

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&endpoint)
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .build();

        tracing::info!(
            bucket = %settings.bucket,
            region = %settings.region,
            endpoint = %endpoint,
            "S3 client initialized"
        );

        Ok(S3Storage {
            client: Client::from_conf(s3_config),
            bucket: settings.bucket.clone(),
            endpoint,
        })
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        source: &Path,
        part_size: u64,
    ) -> StorageResult<Vec<CompletedPart>> {
        let mut file = tokio::fs::File::open(source).await?;
        let part_size = usize::try_from(part_size)
            .map_err(|_| StorageError::ConfigError("part size exceeds address space".into()))?;

        let mut parts = Vec::new();
        let mut part_number = 1i32;
        let mut part_buffer = vec![0u8; part_size];

        loop {
            let mut bytes_in_part = 0usize;
            while bytes_in_part < part_size {
                let bytes_read = file.read(&mut part_buffer[bytes_in_part..]).await?;
                if bytes_read == 0 {
                    break;
                }
                bytes_in_part += bytes_read;
            }

            if bytes_in_part == 0 {
                break;
            }

            let output = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(part_buffer[..bytes_in_part].to_vec()))
                .send()
                .await
                .map_err(|e| StorageError::MultipartFailed {
                    part_number,
                    message: e.to_string(),
                })?;

            let etag = output.e_tag().ok_or_else(|| StorageError::MultipartFailed {
                part_number,
                message: "no ETag returned".to_string(),
            })?;

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(etag)
                    .build(),
            );

            if bytes_in_part < part_size {
                break;
            }
            part_number += 1;
        }

        Ok(parts)
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            tracing::warn!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                upload_id = %upload_id,
                "Failed to abort multipart upload, orphaned parts may remain"
            );
        }
    }
}

/// Prepend `http://` to bare `host:port` endpoints and strip trailing slashes.
fn normalize_endpoint(endpoint: &str) -> StorageResult<String> {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(StorageError::ConfigError("endpoint is empty".to_string()));
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("http://{}", trimmed))
    }
}

fn to_chrono(value: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(value.secs(), value.subsec_nanos())
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_single(
        &self,
        key: &StorageKey,
        source: &Path,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        let start = Instant::now();
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to open buffer: {}", e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .body(body)
            .content_type(&metadata.content_type)
            .content_disposition(metadata.content_disposition(key))
            .acl(ObjectCannedAcl::PublicRead)
            .set_metadata(Some(metadata.user_metadata()))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn put_multipart(
        &self,
        key: &StorageKey,
        source: &Path,
        part_size: u64,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        let start = Instant::now();

        let create_result = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key.as_str())
            .content_type(&metadata.content_type)
            .content_disposition(metadata.content_disposition(key))
            .acl(ObjectCannedAcl::PublicRead)
            .set_metadata(Some(metadata.user_metadata()))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to create multipart upload"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        let upload_id = create_result
            .upload_id()
            .ok_or_else(|| StorageError::UploadFailed("No upload ID returned from S3".to_string()))?
            .to_string();

        let parts = match self
            .upload_parts(key.as_str(), &upload_id, source, part_size)
            .await
        {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!(error = %e, bucket = %self.bucket, key = %key, "Multipart upload failed");
                self.abort_multipart(key.as_str(), &upload_id).await;
                return Err(e);
            }
        };
        let part_count = parts.len();

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        if let Err(e) = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key.as_str())
            .upload_id(&upload_id)
            .multipart_upload(completed)
            .send()
            .await
        {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                "Failed to complete multipart upload"
            );
            self.abort_multipart(key.as_str(), &upload_id).await;
            return Err(StorageError::UploadFailed(e.to_string()));
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            parts = part_count,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 multipart upload successful"
        );

        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<StoredObject>> {
        let mut results = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request
                .send()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?;

            for object in output.contents() {
                if let Some(key) = object.key() {
                    results.push(StoredObject {
                        key: key.to_string(),
                        last_modified: object.last_modified().and_then(to_chrono),
                        size: object.size().unwrap_or(0).max(0) as u64,
                    });
                }
            }

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(str::to_string);
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(results)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(endpoint: &str) -> S3Settings {
        S3Settings {
            access_key_id: "key".to_string(),
            secret_access_key: "secret".to_string(),
            bucket: "photos".to_string(),
            region: "us-east-1".to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            normalize_endpoint("minio:9000").unwrap(),
            "http://minio:9000"
        );
        assert_eq!(
            normalize_endpoint("https://s3.example.com/").unwrap(),
            "https://s3.example.com"
        );
        assert!(normalize_endpoint("  ").is_err());
    }

    #[tokio::test]
    async fn test_public_url_is_path_style() {
        let storage = S3Storage::new(&settings("http://localhost:9000/")).unwrap();
        assert_eq!(
            storage.public_url("2024/03/09/abc.jpg"),
            "http://localhost:9000/photos/2024/03/09/abc.jpg"
        );
    }

    #[tokio::test]
    async fn test_empty_bucket_is_config_error() {
        let mut settings = settings("http://localhost:9000");
        settings.bucket = String::new();
        assert!(matches!(
            S3Storage::new(&settings),
            Err(StorageError::ConfigError(_))
        ));
    }
}
