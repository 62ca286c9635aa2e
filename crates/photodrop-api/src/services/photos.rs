//! Listing of today's uploads with a short-lived shared cache.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use photodrop_core::AppError;
use photodrop_storage::{date_partition, ObjectStorage, StoredObject};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use utoipa::ToSchema;

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub key: String,
    pub url: String,
    pub last_modified: Option<String>,
    pub size: u64,
}

/// Result of a listing call.
#[derive(Debug, Clone)]
pub struct PhotoListing {
    pub photos: Arc<Vec<Photo>>,
    /// Quoted entity tag derived from the refresh time
    pub etag: String,
    pub from_cache: bool,
}

#[derive(Debug)]
struct CachedListing {
    date_key: String,
    photos: Arc<Vec<Photo>>,
    etag: String,
    fetched_at: Instant,
}

fn is_image_key(key: &str) -> bool {
    if key.ends_with('/') {
        return false;
    }
    let lower = key.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub struct PhotoCatalog {
    prefix: String,
    ttl: Duration,
    cache: RwLock<Option<CachedListing>>,
}

impl PhotoCatalog {
    pub fn new(prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            ttl,
            cache: RwLock::new(None),
        }
    }

    async fn cached(&self, date_key: &str) -> Option<PhotoListing> {
        let guard = self.cache.read().await;
        let cached = guard.as_ref()?;
        let fresh = cached.date_key == date_key
            && !cached.photos.is_empty()
            && cached.fetched_at.elapsed() < self.ttl;
        fresh.then(|| PhotoListing {
            photos: Arc::clone(&cached.photos),
            etag: cached.etag.clone(),
            from_cache: true,
        })
    }

    /// Photos stored under the date partition of `now`.
    ///
    /// Empty listings are never served from cache.
    pub async fn today(
        &self,
        storage: &dyn ObjectStorage,
        now: DateTime<Utc>,
    ) -> Result<PhotoListing, AppError> {
        let date_key = now.format("%Y-%m-%d").to_string();
        if let Some(listing) = self.cached(&date_key).await {
            return Ok(listing);
        }

        let prefix = date_partition(&self.prefix, now);
        let objects = storage.list_objects(&prefix).await.map_err(|e| {
            tracing::error!(error = %e, prefix = %prefix, "Error listing storage objects");
            AppError::ListingFailure(e.to_string())
        })?;

        let photos: Arc<Vec<Photo>> = Arc::new(
            objects
                .into_iter()
                .filter(|object| is_image_key(&object.key))
                .map(|object| to_photo(storage, object))
                .collect(),
        );
        let etag = format!("\"{}\"", now.timestamp_millis());

        *self.cache.write().await = Some(CachedListing {
            date_key,
            photos: Arc::clone(&photos),
            etag: etag.clone(),
            fetched_at: Instant::now(),
        });

        Ok(PhotoListing {
            photos,
            etag,
            from_cache: false,
        })
    }
}

fn to_photo(storage: &dyn ObjectStorage, object: StoredObject) -> Photo {
    Photo {
        url: storage.public_url(&object.key),
        last_modified: object
            .last_modified
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true)),
        size: object.size,
        key: object.key,
    }
}
