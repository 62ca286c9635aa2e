//! API constants

/// Name of the multipart field carrying the image.
pub const UPLOAD_FIELD_NAME: &str = "file";

/// Body allowance on top of the file limit for multipart framing and other fields.
pub const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

pub const RATE_LIMIT_CLEANUP_INTERVAL_SECS: u64 = 300;

pub const NO_STORE: &str = "no-store";

pub const PHOTO_CACHE_CONTROL: &str = "max-age=10, stale-while-revalidate=30";

/// Response header carrying the correlation id of a failed request.
pub const X_ERROR_ID: &str = "x-error-id";

pub const SERVICE_NAME: &str = "photodrop";
