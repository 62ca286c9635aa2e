//! Lazily constructed, shared storage client handle.

use std::future::Future;
use std::sync::Arc;

use photodrop_core::S3Settings;
use tokio::sync::OnceCell;

use crate::s3::S3Storage;
use crate::traits::{ObjectStorage, StorageResult};

/// Owns the process-wide storage client.
///
/// The client is built on first use and then shared read-only. Concurrent first
/// requests wait on the same initialization instead of each building a client. A
/// failed initialization leaves the cell empty so a later request can try again.
#[derive(Default)]
pub struct StorageProvider {
    cell: OnceCell<Arc<dyn ObjectStorage>>,
}

impl StorageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider pre-populated with a ready backend.
    pub fn with_storage(storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(storage)),
        }
    }

    /// Return the S3 client, building it from `settings` on first call.
    pub async fn get(&self, settings: &S3Settings) -> StorageResult<Arc<dyn ObjectStorage>> {
        self.get_or_try_init(|| async {
            let storage = S3Storage::new(settings)?;
            Ok(Arc::new(storage) as Arc<dyn ObjectStorage>)
        })
        .await
    }

    pub async fn get_or_try_init<F, Fut>(&self, init: F) -> StorageResult<Arc<dyn ObjectStorage>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StorageResult<Arc<dyn ObjectStorage>>>,
    {
        self.cell.get_or_try_init(init).await.map(Arc::clone)
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
