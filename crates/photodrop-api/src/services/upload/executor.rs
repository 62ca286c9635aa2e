//! Storage transfer with strategy selection and bounded retries.

use std::time::Duration;

use photodrop_core::{AppError, Config, StorageKey};
use photodrop_processing::ParsedFile;
use photodrop_storage::{ObjectMetadata, ObjectStorage, StorageResult};

/// Transfer settings for the upload executor
#[derive(Debug, Clone)]
pub struct UploadExecutorConfig {
    pub multipart_threshold_bytes: u64,
    pub part_size_bytes: u64,
    /// Retries after the first attempt
    pub retry_count: u32,
    pub retry_delay: Duration,
}

impl Default for UploadExecutorConfig {
    fn default() -> Self {
        Self {
            multipart_threshold_bytes: 5 * 1024 * 1024,
            part_size_bytes: 10 * 1024 * 1024,
            retry_count: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl From<&Config> for UploadExecutorConfig {
    fn from(config: &Config) -> Self {
        Self {
            multipart_threshold_bytes: config.multipart_threshold_bytes,
            part_size_bytes: config.multipart_part_size_bytes,
            retry_count: config.retry_count,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStrategy {
    SinglePart,
    Multipart { part_size: u64 },
}

#[derive(Debug, Clone)]
pub struct UploadExecutor {
    config: UploadExecutorConfig,
}

impl UploadExecutor {
    pub fn new(config: UploadExecutorConfig) -> Self {
        Self { config }
    }

    /// Total transfer attempts, first attempt included.
    pub fn max_attempts(&self) -> u32 {
        self.config.retry_count.saturating_add(1)
    }

    /// Sizes at or below the threshold go in a single put.
    pub fn strategy(&self, size: u64) -> TransferStrategy {
        if size > self.config.multipart_threshold_bytes {
            TransferStrategy::Multipart {
                part_size: self.config.part_size_bytes,
            }
        } else {
            TransferStrategy::SinglePart
        }
    }

    async fn transfer(
        &self,
        storage: &dyn ObjectStorage,
        strategy: TransferStrategy,
        file: &ParsedFile,
        key: &StorageKey,
        metadata: &ObjectMetadata,
    ) -> StorageResult<()> {
        // Each attempt opens the buffer afresh
        let source = file.path()?;
        match strategy {
            TransferStrategy::SinglePart => storage.put_single(key, source, metadata).await,
            TransferStrategy::Multipart { part_size } => {
                storage
                    .put_multipart(key, source, part_size, metadata)
                    .await
            }
        }
    }

    /// Store `file` under `key`, retrying every failure with a fixed delay.
    ///
    /// The caller keeps ownership of the buffer and releases it afterwards.
    pub async fn upload(
        &self,
        storage: &dyn ObjectStorage,
        file: &ParsedFile,
        key: &StorageKey,
    ) -> Result<(), AppError> {
        let metadata = ObjectMetadata::new(&file.content_type, &file.original_filename);
        let strategy = self.strategy(file.size);
        let max_attempts = self.max_attempts();

        match strategy {
            TransferStrategy::SinglePart => {
                tracing::info!(file_size = file.size, "Using single-part upload");
            }
            TransferStrategy::Multipart { part_size } => {
                tracing::info!(
                    file_size = file.size,
                    threshold = self.config.multipart_threshold_bytes,
                    part_size = part_size,
                    "Using multipart upload"
                );
            }
        }

        let mut failures: Vec<String> = Vec::new();
        for attempt in 1..=max_attempts {
            match self.transfer(storage, strategy, file, key, &metadata).await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(attempt = attempt, key = %key, "Upload succeeded after retry");
                    }
                    return Ok(());
                }
                Err(e) => {
                    failures.push(e.to_string());
                    if attempt < max_attempts {
                        tracing::warn!(
                            attempt = attempt,
                            max_attempts = max_attempts,
                            error = %e,
                            "Retry attempt {} after error",
                            attempt
                        );
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        tracing::error!(
            key = %key,
            attempts = max_attempts,
            errors = ?failures,
            "Error uploading to storage"
        );

        Err(AppError::TransientStorageFailure {
            attempts: max_attempts,
            last_error: failures.pop().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use photodrop_processing::TempBuffer;
    use photodrop_storage::{StorageError, StoredObject};
    use std::io::Write;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Single { bytes: Vec<u8> },
        Multipart { bytes: Vec<u8>, part_size: u64 },
    }

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyStorage {
        failures: usize,
        calls: Mutex<Vec<Call>>,
    }

    impl FlakyStorage {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) -> StorageResult<()> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            if calls.len() <= self.failures {
                Err(StorageError::UploadFailed(format!(
                    "connection reset (attempt {})",
                    calls.len()
                )))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ObjectStorage for FlakyStorage {
        async fn put_single(
            &self,
            _key: &StorageKey,
            source: &Path,
            _metadata: &ObjectMetadata,
        ) -> StorageResult<()> {
            let bytes = tokio::fs::read(source).await?;
            self.record(Call::Single { bytes })
        }

        async fn put_multipart(
            &self,
            _key: &StorageKey,
            source: &Path,
            part_size: u64,
            _metadata: &ObjectMetadata,
        ) -> StorageResult<()> {
            let bytes = tokio::fs::read(source).await?;
            self.record(Call::Multipart { bytes, part_size })
        }

        async fn list_objects(&self, _prefix: &str) -> StorageResult<Vec<StoredObject>> {
            Ok(Vec::new())
        }

        fn public_url(&self, key: &str) -> String {
            format!("http://storage/{}", key)
        }
    }

    fn parsed_file(len: usize) -> ParsedFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![9u8; len]).unwrap();
        ParsedFile::new(
            "image/png",
            "a.png",
            len as u64,
            TempBuffer::new(file.into_temp_path()),
        )
    }

    fn executor(threshold: u64, retry_count: u32) -> UploadExecutor {
        UploadExecutor::new(UploadExecutorConfig {
            multipart_threshold_bytes: threshold,
            part_size_bytes: 8,
            retry_count,
            retry_delay: Duration::from_millis(500),
        })
    }

    #[test]
    fn test_strategy_boundary() {
        let executor = executor(100, 0);
        assert_eq!(executor.strategy(99), TransferStrategy::SinglePart);
        assert_eq!(executor.strategy(100), TransferStrategy::SinglePart);
        assert_eq!(
            executor.strategy(101),
            TransferStrategy::Multipart { part_size: 8 }
        );
    }

    #[tokio::test]
    async fn test_exactly_threshold_uses_single_part() {
        let storage = FlakyStorage::new(0);
        let file = parsed_file(64);
        executor(64, 0)
            .upload(&storage, &file, &StorageKey::new("k.png"))
            .await
            .unwrap();
        assert!(matches!(storage.calls()[..], [Call::Single { .. }]));
    }

    #[tokio::test]
    async fn test_one_byte_over_threshold_uses_multipart() {
        let storage = FlakyStorage::new(0);
        let file = parsed_file(65);
        executor(64, 0)
            .upload(&storage, &file, &StorageKey::new("k.png"))
            .await
            .unwrap();
        assert!(matches!(
            storage.calls()[..],
            [Call::Multipart { part_size: 8, .. }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_transfer_surfaces_one_transient_failure() {
        let storage = FlakyStorage::new(usize::MAX);
        let file = parsed_file(10);
        let started = tokio::time::Instant::now();

        let result = executor(64, 3)
            .upload(&storage, &file, &StorageKey::new("k.png"))
            .await;

        assert_eq!(
            result,
            Err(AppError::TransientStorageFailure {
                attempts: 4,
                last_error: "Upload failed: connection reset (attempt 4)".to_string(),
            })
        );
        assert_eq!(storage.calls().len(), 4);
        // Three fixed delays between four attempts
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert!(!file.is_released(), "the caller owns cleanup");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_rereads_the_same_buffer() {
        let storage = FlakyStorage::new(2);
        let file = parsed_file(10);

        executor(64, 3)
            .upload(&storage, &file, &StorageKey::new("k.png"))
            .await
            .unwrap();

        let calls = storage.calls();
        assert_eq!(calls.len(), 3);
        for call in calls {
            assert_eq!(call, Call::Single { bytes: vec![9u8; 10] });
        }
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let storage = FlakyStorage::new(usize::MAX);
        let file = parsed_file(10);
        let result = executor(64, 0)
            .upload(&storage, &file, &StorageKey::new("k.png"))
            .await;
        assert!(matches!(
            result,
            Err(AppError::TransientStorageFailure { attempts: 1, .. })
        ));
        assert_eq!(storage.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_released_buffer_is_a_failure_not_a_panic() {
        let storage = FlakyStorage::new(0);
        let mut file = parsed_file(10);
        file.release();
        let result = executor(64, 0)
            .upload(&storage, &file, &StorageKey::new("k.png"))
            .await;
        assert!(matches!(
            result,
            Err(AppError::TransientStorageFailure { .. })
        ));
        assert!(storage.calls().is_empty());
    }
}
