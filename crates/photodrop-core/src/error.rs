//! Error types module
//!
//! Every stage of the upload pipeline reports failures through the closed `AppError`
//! enumeration. The `ErrorMetadata` trait lets the response layer render any variant
//! without inspecting error payloads at runtime.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like rate limits
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "UNSUPPORTED_TYPE")
    fn error_code(&self) -> &'static str;

    /// Human-readable summary shown to the client as `message`
    fn client_message(&self) -> String;

    /// Client-facing detail shown as `error`. Sensitive errors return a generic text.
    fn client_detail(&self) -> String;

    /// Whether internal details must never reach the client
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Origin not permitted: {origin}")]
    CorsRejected { origin: String },

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("File too large: limit is {limit_bytes} bytes")]
    PayloadTooLarge { limit_bytes: u64 },

    #[error("No file uploaded")]
    NoFileProvided,

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Unsupported content type: {content_type}")]
    UnsupportedType { content_type: String },

    #[error("Extension {extension} is not valid for type {content_type}")]
    ExtensionMismatch {
        extension: String,
        content_type: String,
        expected: Vec<String>,
    },

    #[error("Content does not match declared type {declared} (detected: {})", detected.as_deref().unwrap_or("none"))]
    ContentMismatch {
        declared: String,
        detected: Option<String>,
    },

    #[error("Storage transfer failed after {attempts} attempts: {last_error}")]
    TransientStorageFailure { attempts: u32, last_error: String },

    #[error("Storage unavailable: {0}")]
    PermanentStorageFailure(String),

    #[error("Listing failed: {0}")]
    ListingFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", err))
    }
}

fn trim_decimal(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as u64)
    } else {
        let rendered = format!("{:.2}", value);
        rendered.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Render a byte limit with its unit ("40MB", "2.5MB", "1KB", "512 bytes").
///
/// Limits under a megabyte fall back to KB or bytes so they never print as zero.
pub fn format_size_limit(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes >= MB {
        format!("{}MB", trim_decimal(bytes as f64 / MB as f64))
    } else if bytes >= KB {
        format!("{}KB", trim_decimal(bytes as f64 / KB as f64))
    } else {
        format!("{} bytes", bytes)
    }
}

/// Static metadata for each variant: (http_status, error_code, sensitive, log_level).
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, LogLevel) {
    use AppError::*;
    match err {
        Configuration(_) => (500, "CONFIGURATION_ERROR", true, LogLevel::Error),
        CorsRejected { .. } => (403, "CORS_REJECTED", false, LogLevel::Warn),
        RateLimited { .. } => (429, "RATE_LIMITED", false, LogLevel::Warn),
        PayloadTooLarge { .. } => (413, "PAYLOAD_TOO_LARGE", false, LogLevel::Debug),
        NoFileProvided => (400, "NO_FILE_PROVIDED", false, LogLevel::Debug),
        MalformedRequest(_) => (400, "MALFORMED_REQUEST", false, LogLevel::Debug),
        UnsupportedType { .. } => (415, "UNSUPPORTED_TYPE", false, LogLevel::Debug),
        ExtensionMismatch { .. } => (415, "EXTENSION_MISMATCH", false, LogLevel::Debug),
        ContentMismatch { .. } => (415, "CONTENT_MISMATCH", true, LogLevel::Warn),
        TransientStorageFailure { .. } => (500, "STORAGE_FAILURE", true, LogLevel::Error),
        PermanentStorageFailure(_) => (500, "STORAGE_UNAVAILABLE", true, LogLevel::Error),
        ListingFailure(_) => (500, "LISTING_FAILURE", true, LogLevel::Error),
        Internal(_) => (500, "INTERNAL_ERROR", true, LogLevel::Error),
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Configuration(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            AppError::CorsRejected { .. } => "CORS not allowed".to_string(),
            AppError::RateLimited { .. } => "Too Many Requests".to_string(),
            AppError::PayloadTooLarge { limit_bytes } => format!(
                "File too large. Maximum size is {}.",
                format_size_limit(*limit_bytes)
            ),
            AppError::NoFileProvided => "No file uploaded".to_string(),
            AppError::MalformedRequest(_) => "Error parsing form data".to_string(),
            AppError::UnsupportedType { .. } => {
                "Invalid file type. Only images are allowed.".to_string()
            }
            AppError::ExtensionMismatch { .. } => {
                "File extension doesn't match content type".to_string()
            }
            AppError::ContentMismatch { .. } => {
                "File content doesn't match the declared type".to_string()
            }
            AppError::TransientStorageFailure { .. } | AppError::PermanentStorageFailure(_) => {
                "Error uploading file".to_string()
            }
            AppError::ListingFailure(_) => "Error listing photos".to_string(),
        }
    }

    fn client_detail(&self) -> String {
        match self {
            AppError::Configuration(_) => "Server configuration error".to_string(),
            AppError::CorsRejected { .. } => "Origin not permitted".to_string(),
            AppError::RateLimited { retry_after_secs } => {
                format!("Retry after {} seconds", retry_after_secs)
            }
            AppError::PayloadTooLarge { limit_bytes } => {
                format!("Maximum upload size is {} bytes", limit_bytes)
            }
            AppError::NoFileProvided => "The form has no file field named 'file'".to_string(),
            AppError::MalformedRequest(msg) => msg.clone(),
            AppError::UnsupportedType { content_type } => {
                format!("File type {} is not supported.", content_type)
            }
            AppError::ExtensionMismatch {
                extension,
                content_type,
                expected,
            } => format!(
                "Extension {} is not valid for type {} (expected {})",
                if extension.is_empty() { "(none)" } else { extension },
                content_type,
                expected.join(", ")
            ),
            // Never reveal the sniffed type
            AppError::ContentMismatch { .. } => "Security validation failed".to_string(),
            AppError::TransientStorageFailure { .. } | AppError::PermanentStorageFailure(_) => {
                "The file could not be stored. Please try again later.".to_string()
            }
            AppError::ListingFailure(_) => "The photo listing is unavailable".to_string(),
            AppError::Internal(_) => "An unexpected error occurred".to_string(),
        }
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }
}
