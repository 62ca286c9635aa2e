use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    response::Response,
};
use photodrop_infra::get_request_id;
use tracing::Instrument;

use crate::response::{ErrorResponse, RateLimitResponse, ResponseBuilder, UploadResponse};
use crate::services::UploadRequest;
use crate::state::AppState;
use crate::utils::ip_extraction::ClientIp;

fn header_str(request: &Request, name: header::HeaderName) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Upload one image
///
/// Accepts a `multipart/form-data` body with a single `file` field. The file is
/// validated, authenticated against its declared type and stored under a
/// date-partitioned key.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "upload",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image uploaded successfully", body = UploadResponse),
        (status = 400, description = "No file or malformed form data", body = ErrorResponse),
        (status = 403, description = "Origin not permitted", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Unsupported or disguised file type", body = ErrorResponse),
        (status = 429, description = "Too many uploads", body = RateLimitResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    request: Request,
) -> Response {
    let request_id = get_request_id(&request).unwrap_or_default();
    let user_agent = header_str(&request, header::USER_AGENT).unwrap_or_default();
    let origin = header_str(&request, header::ORIGIN);
    let content_length = header_str(&request, header::CONTENT_LENGTH)
        .and_then(|v| v.trim().parse::<u64>().ok());

    let span = tracing::info_span!(
        "upload_image",
        request_id = %request_id,
        client_ip = %client_ip,
        user_agent = %user_agent,
    );

    async move {
        tracing::info!("Upload request received");
        let outcome = state
            .upload_service
            .process(UploadRequest {
                client_ip,
                origin,
                content_length,
                request,
            })
            .await;
        ResponseBuilder::build(outcome)
    }
    .instrument(span)
    .await
}
