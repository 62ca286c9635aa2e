//! Storage abstraction trait
//!
//! This module defines the `ObjectStorage` trait implemented by the S3 backend and by
//! test doubles.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use photodrop_core::StorageKey;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Multipart upload failed at part {part_number}: {message}")]
    MultipartFailed { part_number: i32, message: String },

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Metadata attached to every stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub original_filename: String,
    pub uploaded_at: DateTime<Utc>,
}

impl ObjectMetadata {
    pub fn new(content_type: impl Into<String>, original_filename: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            original_filename: original_filename.into(),
            uploaded_at: Utc::now(),
        }
    }

    /// User metadata map (`x-amz-meta-*`).
    pub fn user_metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            (
                "original-filename".to_string(),
                urlencoding::encode(&self.original_filename).into_owned(),
            ),
            (
                "upload-date".to_string(),
                self.uploaded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            ("content-type".to_string(), self.content_type.clone()),
        ])
    }

    /// `inline` disposition carrying the url-encoded original name, falling back to
    /// the key's file name when the client sent none.
    pub fn content_disposition(&self, key: &StorageKey) -> String {
        let name = if self.original_filename.is_empty() {
            key.file_name()
        } else {
            self.original_filename.as_str()
        };
        format!("inline; filename=\"{}\"", urlencoding::encode(name))
    }
}

/// One entry of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
}

/// Storage abstraction trait
///
/// Transfers read from a file on disk so that every attempt opens a fresh handle on
/// the same buffered content.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store the whole file with one atomic put.
    async fn put_single(
        &self,
        key: &StorageKey,
        source: &Path,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()>;

    /// Store the file with the multipart protocol using `part_size` byte parts.
    ///
    /// On failure every uploaded part is discarded; no partial object becomes visible.
    async fn put_multipart(
        &self,
        key: &StorageKey,
        source: &Path,
        part_size: u64,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()>;

    /// List every object under `prefix`.
    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<StoredObject>>;

    /// Publicly reachable URL of `key`.
    fn public_url(&self, key: &str) -> String;
}
