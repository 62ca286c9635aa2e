//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; any `AppError` converts
//! with `?` and renders through `ResponseBuilder`.

use axum::response::{IntoResponse, Response};
use photodrop_core::AppError;

use crate::response::ResponseBuilder;

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from photodrop-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(err.into())
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        ResponseBuilder::error(&self.0)
    }
}
