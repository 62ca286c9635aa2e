//! Upload pipeline

pub mod executor;
pub mod service;

pub use executor::{TransferStrategy, UploadExecutor, UploadExecutorConfig};
pub use service::{UploadRequest, UploadService};
