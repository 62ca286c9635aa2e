//! Types for the upload pipeline.

use std::io;
use std::path::Path;

use tempfile::TempPath;
use tokio::io::AsyncReadExt;

/// Temporary on-disk buffer holding one uploaded file.
///
/// Released exactly once: either by an explicit `release` or, if the pipeline is
/// dropped first (client disconnect), by `Drop`. A failed delete is logged and never
/// propagated.
#[derive(Debug)]
pub struct TempBuffer {
    path: Option<TempPath>,
}

impl TempBuffer {
    pub fn new(path: TempPath) -> Self {
        Self { path: Some(path) }
    }

    /// Path of the buffered content, `None` once released.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_released(&self) -> bool {
        self.path.is_none()
    }

    /// Delete the buffer. Returns `true` only for the call that actually released it.
    pub fn release(&mut self) -> bool {
        let Some(path) = self.path.take() else {
            return false;
        };

        let path_str = path.display().to_string();
        match path.close() {
            Ok(()) => {
                tracing::debug!(path = %path_str, "Temporary upload buffer released");
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path_str, "Failed to clean up temporary file");
            }
        }
        true
    }
}

impl Drop for TempBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

/// A fully buffered file field extracted from the upload form.
#[derive(Debug)]
pub struct ParsedFile {
    /// Declared MIME type, normalized (lower-case, parameters stripped).
    pub content_type: String,
    /// Filename as sent by the client; may be empty.
    pub original_filename: String,
    pub size: u64,
    buffer: TempBuffer,
}

impl ParsedFile {
    pub fn new(
        content_type: impl Into<String>,
        original_filename: impl Into<String>,
        size: u64,
        buffer: TempBuffer,
    ) -> Self {
        Self {
            content_type: content_type.into(),
            original_filename: original_filename.into(),
            size,
            buffer,
        }
    }

    /// Path of the buffered content.
    pub fn path(&self) -> io::Result<&Path> {
        self.buffer.path().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "upload buffer already released")
        })
    }

    /// Read at most `limit` leading bytes of the buffered content.
    pub async fn read_head(&self, limit: usize) -> io::Result<Vec<u8>> {
        let file = tokio::fs::File::open(self.path()?).await?;
        let mut head = Vec::with_capacity(limit);
        file.take(limit as u64).read_to_end(&mut head).await?;
        Ok(head)
    }

    pub fn is_released(&self) -> bool {
        self.buffer.is_released()
    }

    /// Release the temporary buffer; see `TempBuffer::release`.
    pub fn release(&mut self) -> bool {
        self.buffer.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn buffered(content: &[u8]) -> (ParsedFile, std::path::PathBuf) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        let path = file.into_temp_path();
        let location = path.to_path_buf();
        let parsed = ParsedFile::new(
            "image/png",
            "a.png",
            content.len() as u64,
            TempBuffer::new(path),
        );
        (parsed, location)
    }

    #[tokio::test]
    async fn test_read_head_is_bounded() {
        let (parsed, _) = buffered(&[7u8; 10_000]);
        let head = parsed.read_head(4100).await.unwrap();
        assert_eq!(head.len(), 4100);

        let head = parsed.read_head(4100).await.unwrap();
        assert_eq!(head.len(), 4100, "buffer can be re-read");
    }

    #[test]
    fn test_release_exactly_once() {
        let (mut parsed, location) = buffered(b"data");
        assert!(location.exists());
        assert!(parsed.release());
        assert!(!location.exists());
        assert!(!parsed.release());
        assert!(parsed.is_released());
        assert!(parsed.path().is_err());
    }

    #[test]
    fn test_drop_releases_buffer() {
        let (parsed, location) = buffered(b"data");
        drop(parsed);
        assert!(!location.exists());
    }

    #[test]
    fn test_release_failure_is_not_propagated() {
        let (mut parsed, location) = buffered(b"data");
        std::fs::remove_file(&location).unwrap();
        assert!(parsed.release());
        assert!(!parsed.release());
    }
}
