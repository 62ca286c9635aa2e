//! OpenAPI documentation, served at `/api/openapi.json`.

use utoipa::OpenApi;

use crate::handlers;
use crate::response::{ErrorResponse, RateLimitResponse, UploadResponse};
use crate::services::Photo;
use crate::setup::routes::health;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Photodrop API",
        version = "0.1.0",
        description = "Image ingestion service: validated, rate-limited uploads to S3-compatible storage and a listing of today's photos."
    ),
    paths(
        handlers::upload::upload_image,
        handlers::photos::list_photos,
        health::liveness_check,
    ),
    components(
        schemas(
            UploadResponse,
            ErrorResponse,
            RateLimitResponse,
            Photo,
            health::HealthResponse,
        )
    ),
    tags(
        (name = "upload", description = "Image upload"),
        (name = "photos", description = "Photo listing"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;
