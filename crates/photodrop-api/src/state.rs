//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use photodrop_core::Config;
use photodrop_infra::RateLimiter;
use photodrop_storage::StorageProvider;

use crate::services::{PhotoCatalog, UploadService};

pub struct AppState {
    pub config: Arc<Config>,
    /// Lazily built storage client, shared by uploads and listings
    pub storage: Arc<StorageProvider>,
    pub rate_limiter: Arc<RateLimiter>,
    pub upload_service: UploadService,
    pub photo_catalog: PhotoCatalog,
}

impl AppState {
    pub fn new(config: Config, storage: StorageProvider) -> Self {
        let config = Arc::new(config);
        let storage = Arc::new(storage);
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_points,
            config.rate_limit_duration_secs,
        ));
        let upload_service =
            UploadService::new(config.clone(), rate_limiter.clone(), storage.clone());
        let photo_catalog = PhotoCatalog::new(
            config.upload_path_prefix.clone(),
            Duration::from_secs(config.photo_cache_ttl_secs),
        );

        Self {
            config,
            storage,
            rate_limiter,
            upload_service,
            photo_catalog,
        }
    }
}
