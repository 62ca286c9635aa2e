//! Photodrop Storage Library
//!
//! Object storage abstraction for uploaded images, the S3 implementation, the lazily
//! constructed shared client handle, and storage key generation.
//!
//! # Storage key format
//!
//! `{prefix}{YYYY}/{MM}/{DD}/{uuid}{ext}` where the date is the UTC upload date and
//! `{ext}` is the lower-cased extension of the original filename. Key generation is
//! centralized in the `keys` module.

pub mod keys;
pub mod provider;
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use keys::{date_partition, generate_storage_key};
pub use provider::StorageProvider;
pub use s3::S3Storage;
pub use traits::{ObjectMetadata, ObjectStorage, StorageError, StorageResult, StoredObject};
