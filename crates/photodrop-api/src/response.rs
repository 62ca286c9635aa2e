//! Maps pipeline outcomes to HTTP responses.
//!
//! Every failure gets a fresh correlation id, which is logged together with the full
//! internal error and returned to the client as `errorId` and `X-Error-Id`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use photodrop_core::{AppError, ErrorMetadata, LogLevel, StorageKey, UploadOutcome};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::constants::{NO_STORE, X_ERROR_ID};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    /// Public URL of the stored object
    pub file_url: String,
    /// Storage key of the stored object
    pub file_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Human-readable summary
    pub message: String,
    /// Machine-readable detail
    pub error: String,
    /// Correlation id for server logs
    pub error_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResponse {
    pub message: String,
    /// Seconds until a request will be admitted again
    pub retry_after: u64,
}

fn log_error(error: &AppError, error_id: &str) {
    let code = error.error_code();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error_id = %error_id, error = %error, code = code, "Request rejected");
        }
        LogLevel::Warn => {
            tracing::warn!(error_id = %error_id, error = %error, code = code, "Request rejected");
        }
        LogLevel::Error => {
            tracing::error!(error_id = %error_id, error = %error, code = code, "Request failed");
        }
    }
}

fn with_no_store(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
    response
}

pub struct ResponseBuilder;

impl ResponseBuilder {
    /// Render the outcome of one upload.
    pub fn build(outcome: UploadOutcome) -> Response {
        match outcome {
            UploadOutcome::Success { key, url } => Self::success(&key, url),
            other => match other.into_error() {
                Some(error) => Self::error(&error),
                None => Self::error(&AppError::Internal("outcome without error".to_string())),
            },
        }
    }

    pub fn success(key: &StorageKey, file_url: String) -> Response {
        tracing::info!(file_url = %file_url, file_name = %key, "File uploaded successfully");
        with_no_store(
            (
                StatusCode::OK,
                Json(UploadResponse {
                    message: "Image uploaded successfully".to_string(),
                    file_url,
                    file_name: key.to_string(),
                }),
            )
                .into_response(),
        )
    }

    /// Render any error with a fresh correlation id.
    pub fn error(error: &AppError) -> Response {
        let error_id = Uuid::new_v4().to_string();
        log_error(error, &error_id);

        let status = StatusCode::from_u16(error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = match error {
            AppError::RateLimited { retry_after_secs } => {
                let mut response = (
                    status,
                    Json(RateLimitResponse {
                        message: error.client_message(),
                        retry_after: *retry_after_secs,
                    }),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
                response
            }
            _ => (
                status,
                Json(ErrorResponse {
                    message: error.client_message(),
                    error: error.client_detail(),
                    error_id: error_id.clone(),
                }),
            )
                .into_response(),
        };

        if let Ok(value) = HeaderValue::from_str(&error_id) {
            response.headers_mut().insert(X_ERROR_ID, value);
        }
        with_no_store(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_shape() {
        let response = ResponseBuilder::build(UploadOutcome::Success {
            key: StorageKey::new("2024/03/09/abc.jpg"),
            url: "http://s3/photos/2024/03/09/abc.jpg".to_string(),
        });
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        let body = body_json(response).await;
        assert_eq!(body["message"], "Image uploaded successfully");
        assert_eq!(body["fileUrl"], "http://s3/photos/2024/03/09/abc.jpg");
        assert_eq!(body["fileName"], "2024/03/09/abc.jpg");
    }

    #[tokio::test]
    async fn test_error_ids_are_unique_and_echoed() {
        let first = ResponseBuilder::error(&AppError::NoFileProvided);
        let second = ResponseBuilder::error(&AppError::NoFileProvided);
        let first_header = first.headers()[X_ERROR_ID].to_str().unwrap().to_string();
        let second_header = second.headers()[X_ERROR_ID].to_str().unwrap().to_string();
        assert_ne!(first_header, second_header);

        let body = body_json(first).await;
        assert_eq!(body["errorId"], first_header.as_str());
        assert_eq!(body["message"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_rate_limited_shape() {
        let response = ResponseBuilder::build(UploadOutcome::RateLimited {
            retry_after_secs: 42,
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        let body = body_json(response).await;
        assert_eq!(body["message"], "Too Many Requests");
        assert_eq!(body["retryAfter"], 42);
    }

    #[tokio::test]
    async fn test_transient_failure_is_generic_500() {
        let response = ResponseBuilder::build(UploadOutcome::TransientFailure {
            last_error: "AccessDenied: bucket policy".to_string(),
            attempts: 4,
        });
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Error uploading file");
        assert!(!body["error"].as_str().unwrap().contains("AccessDenied"));
    }

    #[tokio::test]
    async fn test_configuration_error_is_generic_500() {
        let response = ResponseBuilder::build(UploadOutcome::PermanentFailure(
            AppError::Configuration("Missing required environment variables: S3_REGION".into()),
        ));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Internal server error");
        assert!(!body["error"].as_str().unwrap().contains("S3_REGION"));
    }
}
