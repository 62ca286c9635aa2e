//! Photodrop API Library
//!
//! HTTP surface of the image ingestion service: the upload pipeline, the photo
//! listing, health and OpenAPI routes, and application setup.

// Module declarations
mod api_doc;
pub mod constants;
mod handlers;
mod utils;

// Public modules
pub mod error;
pub mod response;
pub mod services;
pub mod setup;
pub mod state;
pub mod validation;

// Re-exports
pub use error::HttpAppError;
pub use response::{ErrorResponse, RateLimitResponse, ResponseBuilder, UploadResponse};
pub use state::AppState;
