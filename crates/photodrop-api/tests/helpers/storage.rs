//! In-memory `ObjectStorage` that records every call.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use photodrop_core::StorageKey;
use photodrop_storage::{ObjectMetadata, ObjectStorage, StorageError, StorageResult, StoredObject};

#[derive(Debug, Clone)]
pub struct RecordedPut {
    pub key: String,
    pub source: PathBuf,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub original_filename: String,
    pub multipart: bool,
}

#[derive(Default)]
pub struct RecordingStorage {
    puts: Mutex<Vec<RecordedPut>>,
    attempts: AtomicUsize,
    sources: Mutex<Vec<PathBuf>>,
    fail_uploads: bool,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every put fails with a network-style error.
    pub fn failing() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    pub fn puts(&self) -> Vec<RecordedPut> {
        self.puts.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Temp file paths handed to any put call, including failed ones.
    pub fn sources(&self) -> Vec<PathBuf> {
        self.sources.lock().unwrap().clone()
    }

    fn record(
        &self,
        key: &StorageKey,
        source: &Path,
        metadata: &ObjectMetadata,
        multipart: bool,
    ) -> StorageResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.sources.lock().unwrap().push(source.to_path_buf());
        if self.fail_uploads {
            return Err(StorageError::UploadFailed("connection reset".to_string()));
        }
        let bytes = std::fs::read(source)?;
        self.puts.lock().unwrap().push(RecordedPut {
            key: key.to_string(),
            source: source.to_path_buf(),
            bytes,
            content_type: metadata.content_type.clone(),
            original_filename: metadata.original_filename.clone(),
            multipart,
        });
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for RecordingStorage {
    async fn put_single(
        &self,
        key: &StorageKey,
        source: &Path,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        self.record(key, source, metadata, false)
    }

    async fn put_multipart(
        &self,
        key: &StorageKey,
        source: &Path,
        _part_size: u64,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        self.record(key, source, metadata, true)
    }

    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<StoredObject>> {
        Ok(self
            .puts
            .lock()
            .unwrap()
            .iter()
            .filter(|put| put.key.starts_with(prefix))
            .map(|put| StoredObject {
                key: put.key.clone(),
                last_modified: Some(Utc::now()),
                size: put.bytes.len() as u64,
            })
            .collect())
    }

    fn public_url(&self, key: &str) -> String {
        format!("http://localhost:9000/photos/{}", key)
    }
}
