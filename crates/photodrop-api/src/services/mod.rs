//! Application services

pub mod photos;
pub mod upload;

pub use photos::{Photo, PhotoCatalog, PhotoListing};
pub use upload::{UploadExecutor, UploadExecutorConfig, UploadRequest, UploadService};
