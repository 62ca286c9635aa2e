//! Photodrop Infrastructure Library
//!
//! Shared infrastructure components used by the API:
//! - Middleware (request ID)
//! - Tracing initialization
//! - Rate limiting

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

// Re-export commonly used types
#[cfg(feature = "middleware")]
pub use middleware::{get_request_id, request_id_middleware, RequestId};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, LogFormat};

#[cfg(feature = "rate-limit")]
pub use rate_limit::{RateLimitDecision, RateLimiter};
