//! Multipart form extraction into a temporary buffer.

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use photodrop_core::AppError;
use photodrop_processing::validator::normalize_mime_type;
use photodrop_processing::{ParsedFile, TempBuffer};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::constants::UPLOAD_FIELD_NAME;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Final path component of a client-supplied filename.
fn base_filename(filename: &str) -> String {
    filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename)
        .trim()
        .to_string()
}

/// Streams the `file` field of a multipart body to disk, enforcing the size limit
/// while reading.
#[derive(Debug, Clone)]
pub struct FormExtractor {
    max_file_size: u64,
}

impl FormExtractor {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    fn map_multipart_error(&self, err: MultipartError) -> AppError {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge {
                limit_bytes: self.max_file_size,
            }
        } else {
            AppError::MalformedRequest(err.body_text())
        }
    }

    /// Buffer exactly one file field named `file`.
    ///
    /// The temp buffer is owned by a `TempBuffer` from the moment it exists, so every
    /// early return releases it.
    pub async fn extract(&self, mut multipart: Multipart) -> Result<ParsedFile, AppError> {
        let mut parsed: Option<ParsedFile> = None;

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| self.map_multipart_error(e))?
        {
            // Plain text fields, even one named `file`, are not uploads
            if field.name() != Some(UPLOAD_FIELD_NAME) || field.file_name().is_none() {
                continue;
            }

            if parsed.is_some() {
                return Err(AppError::MalformedRequest(
                    "Multiple file fields are not allowed; send exactly one field named 'file'"
                        .to_string(),
                ));
            }

            let original_filename = field.file_name().map(base_filename).unwrap_or_default();
            let content_type = field
                .content_type()
                .map(normalize_mime_type)
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

            let (file, path) = NamedTempFile::new()
                .map_err(|e| AppError::Internal(format!("Failed to create temporary file: {}", e)))?
                .into_parts();
            let buffer = TempBuffer::new(path);
            let mut file = tokio::fs::File::from_std(file);

            let mut size = 0u64;
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| self.map_multipart_error(e))?
            {
                size += chunk.len() as u64;
                if size > self.max_file_size {
                    return Err(AppError::PayloadTooLarge {
                        limit_bytes: self.max_file_size,
                    });
                }
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            drop(file);

            if size == 0 {
                return Err(AppError::MalformedRequest("Uploaded file is empty".to_string()));
            }

            tracing::debug!(
                file_name = %original_filename,
                content_type = %content_type,
                size_bytes = size,
                "Form data parsed"
            );
            parsed = Some(ParsedFile::new(content_type, original_filename, size, buffer));
        }

        parsed.ok_or(AppError::NoFileProvided)
    }
}
