//! Content authentication for uploaded images.
//!
//! Three ordered checks, stopping at the first failure:
//! 1. the declared MIME type is on the image allow-list,
//! 2. the filename extension is registered for that MIME type,
//! 3. the leading bytes carry the signature of that MIME type.
//!
//! SVG has no binary signature, so it is accepted on a textual check instead.

use std::path::Path;

use infer::MatcherType;
use photodrop_core::AppError;

use crate::upload::types::ParsedFile;

/// Bytes inspected by the signature sniff.
pub const SNIFF_LENGTH: usize = 4100;

/// Bytes inspected by the SVG text fallback.
pub const SVG_SNIFF_LENGTH: usize = 100;

const SVG_MIME: &str = "image/svg+xml";

/// Allowed image types and the extensions registered for each.
const ALLOWED_TYPES: &[(&str, &[&str])] = &[
    ("image/jpeg", &[".jpg", ".jpeg"]),
    ("image/png", &[".png"]),
    ("image/gif", &[".gif"]),
    ("image/webp", &[".webp"]),
    (SVG_MIME, &[".svg"]),
    ("image/bmp", &[".bmp"]),
    ("image/tiff", &[".tiff", ".tif"]),
    ("image/heic", &[".heic"]),
    ("image/heif", &[".heif"]),
];

/// Content check failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentRejection {
    #[error("Unsupported content type: {content_type}")]
    UnsupportedType { content_type: String },

    #[error("Extension {extension} is not valid for type {content_type}")]
    ExtensionMismatch {
        extension: String,
        content_type: String,
        expected: Vec<String>,
    },

    #[error("Content does not match declared type {declared}")]
    ContentMismatch {
        declared: String,
        detected: Option<String>,
    },
}

impl From<ContentRejection> for AppError {
    fn from(rejection: ContentRejection) -> Self {
        match rejection {
            ContentRejection::UnsupportedType { content_type } => {
                AppError::UnsupportedType { content_type }
            }
            ContentRejection::ExtensionMismatch {
                extension,
                content_type,
                expected,
            } => AppError::ExtensionMismatch {
                extension,
                content_type,
                expected,
            },
            ContentRejection::ContentMismatch { declared, detected } => {
                AppError::ContentMismatch { declared, detected }
            }
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(ContentRejection),
    /// The sniff found no binary signature.
    Inconclusive,
}

/// Normalize a declared MIME type: strip parameters, trim, lower-case.
pub fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Lower-cased extension with its dot (`photo.JPG` -> `.jpg`), empty when absent.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Detected formats that satisfy a declared type.
fn detected_matches(declared: &str, detected: &str) -> bool {
    // Signature matchers report HEIC containers as HEIF.
    declared == detected || (declared == "image/heic" && detected == "image/heif")
}

#[derive(Debug, Clone, Default)]
pub struct ContentAuthenticator;

impl ContentAuthenticator {
    pub fn new() -> Self {
        Self
    }

    /// Extensions registered for `content_type`, if it is allowed.
    pub fn allowed_extensions(&self, content_type: &str) -> Option<&'static [&'static str]> {
        ALLOWED_TYPES
            .iter()
            .find(|(mime, _)| *mime == content_type)
            .map(|(_, extensions)| *extensions)
    }

    pub fn is_allowed_type(&self, content_type: &str) -> bool {
        self.allowed_extensions(content_type).is_some()
    }

    pub fn check_allow_list(&self, content_type: &str) -> Verdict {
        if self.is_allowed_type(content_type) {
            Verdict::Pass
        } else {
            Verdict::Fail(ContentRejection::UnsupportedType {
                content_type: content_type.to_string(),
            })
        }
    }

    pub fn check_extension(&self, filename: &str, content_type: &str) -> Verdict {
        let Some(allowed) = self.allowed_extensions(content_type) else {
            return self.check_allow_list(content_type);
        };

        let extension = extension_of(filename);
        if allowed.contains(&extension.as_str()) {
            Verdict::Pass
        } else {
            Verdict::Fail(ContentRejection::ExtensionMismatch {
                extension,
                content_type: content_type.to_string(),
                expected: allowed.iter().map(|e| e.to_string()).collect(),
            })
        }
    }

    /// Compare the magic-byte signature of `head` with the declared type.
    ///
    /// Text-class matches (XML, HTML) are not binary signatures and count as
    /// inconclusive.
    pub fn sniff_signature(&self, head: &[u8], content_type: &str) -> Verdict {
        match infer::get(head) {
            Some(kind) if kind.matcher_type() != MatcherType::Text => {
                if detected_matches(content_type, kind.mime_type()) {
                    Verdict::Pass
                } else {
                    Verdict::Fail(ContentRejection::ContentMismatch {
                        declared: content_type.to_string(),
                        detected: Some(kind.mime_type().to_string()),
                    })
                }
            }
            _ => Verdict::Inconclusive,
        }
    }

    /// Textual SVG check: the leading bytes must contain `<svg` and `xmlns`,
    /// case-insensitively.
    pub fn svg_fallback(&self, head: &[u8]) -> Verdict {
        let window = &head[..head.len().min(SVG_SNIFF_LENGTH)];
        let text = String::from_utf8_lossy(window).to_lowercase();
        if text.contains("<svg") && text.contains("xmlns") {
            Verdict::Pass
        } else {
            Verdict::Fail(ContentRejection::ContentMismatch {
                declared: SVG_MIME.to_string(),
                detected: None,
            })
        }
    }

    /// Run all three checks against already-read leading bytes.
    pub fn authenticate_head(
        &self,
        filename: &str,
        content_type: &str,
        head: &[u8],
    ) -> Result<(), ContentRejection> {
        if let Verdict::Fail(rejection) = self.check_allow_list(content_type) {
            return Err(rejection);
        }
        if let Verdict::Fail(rejection) = self.check_extension(filename, content_type) {
            return Err(rejection);
        }
        self.verify_signature(head, content_type)
    }

    /// Signature sniff with the SVG text fallback; no allow-list or extension check.
    pub fn verify_signature(
        &self,
        head: &[u8],
        content_type: &str,
    ) -> Result<(), ContentRejection> {
        match self.sniff_signature(head, content_type) {
            Verdict::Pass => Ok(()),
            Verdict::Fail(rejection) => Err(rejection),
            Verdict::Inconclusive if content_type == SVG_MIME => match self.svg_fallback(head) {
                Verdict::Fail(rejection) => Err(rejection),
                _ => Ok(()),
            },
            Verdict::Inconclusive => Err(ContentRejection::ContentMismatch {
                declared: content_type.to_string(),
                detected: None,
            }),
        }
    }

    /// Authenticate a buffered upload.
    ///
    /// The buffer is only read when the declared type and extension already passed.
    pub async fn authenticate(&self, file: &ParsedFile) -> Result<(), AppError> {
        let content_type = file.content_type.as_str();
        let filename = file.original_filename.as_str();

        if let Verdict::Fail(rejection) = self.check_allow_list(content_type) {
            return Err(rejection.into());
        }
        if let Verdict::Fail(rejection) = self.check_extension(filename, content_type) {
            return Err(rejection.into());
        }

        let head = file.read_head(SNIFF_LENGTH).await?;
        self.verify_signature(&head, content_type)
            .map_err(|rejection| {
                tracing::warn!(
                    declared = %content_type,
                    filename = %filename,
                    reason = %rejection,
                    "Content signature check failed"
                );
                rejection.into()
            })
    }
}
