//! Photodrop Core Library
//!
//! This crate provides the configuration, error taxonomy and shared models used by
//! every stage of the image ingestion pipeline.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{Config, S3Settings};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{StorageKey, UploadOutcome};
