//! Shared pipeline models.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Object key of the form `{prefix}{YYYY}/{MM}/{DD}/{uuid}{ext}`.
///
/// Immutable once generated; a retry of the same upload reuses the key of that
/// request but a new request always gets a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment (`{uuid}{ext}`).
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Final result of one pass through the upload pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success { key: StorageKey, url: String },
    /// Any pre-storage rejection: CORS, size, form, and content checks.
    ValidationRejected(AppError),
    RateLimited { retry_after_secs: u64 },
    TransientFailure { last_error: String, attempts: u32 },
    /// Configuration, storage-client or unexpected internal failure.
    PermanentFailure(AppError),
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success { .. })
    }

    /// The error describing a non-success outcome.
    pub fn into_error(self) -> Option<AppError> {
        match self {
            UploadOutcome::Success { .. } => None,
            UploadOutcome::ValidationRejected(err) | UploadOutcome::PermanentFailure(err) => {
                Some(err)
            }
            UploadOutcome::RateLimited { retry_after_secs } => {
                Some(AppError::RateLimited { retry_after_secs })
            }
            UploadOutcome::TransientFailure {
                last_error,
                attempts,
            } => Some(AppError::TransientStorageFailure {
                attempts,
                last_error,
            }),
        }
    }
}

impl From<AppError> for UploadOutcome {
    fn from(err: AppError) -> Self {
        match err {
            AppError::RateLimited { retry_after_secs } => {
                UploadOutcome::RateLimited { retry_after_secs }
            }
            AppError::TransientStorageFailure {
                attempts,
                last_error,
            } => UploadOutcome::TransientFailure {
                last_error,
                attempts,
            },
            err @ (AppError::Configuration(_)
            | AppError::PermanentStorageFailure(_)
            | AppError::ListingFailure(_)
            | AppError::Internal(_)) => UploadOutcome::PermanentFailure(err),
            other => UploadOutcome::ValidationRejected(other),
        }
    }
}
