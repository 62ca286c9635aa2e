use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use photodrop_core::AppError;

use crate::constants::PHOTO_CACHE_CONTROL;
use crate::error::HttpAppError;
use crate::response::ErrorResponse;
use crate::services::Photo;
use crate::state::AppState;

/// True when the raw query string carries a `nocache` parameter.
fn has_nocache(query: Option<&str>) -> bool {
    query
        .unwrap_or_default()
        .split('&')
        .any(|pair| pair.split('=').next() == Some("nocache"))
}

fn cache_headers(response: &mut Response, etag: &str) {
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(PHOTO_CACHE_CONTROL),
    );
    if let Ok(value) = HeaderValue::from_str(etag) {
        headers.insert(header::ETAG, value);
    }
}

/// List today's photos
#[utoipa::path(
    get,
    path = "/photos",
    tag = "photos",
    params(
        ("nocache" = Option<String>, Query, description = "Skip the conditional 304 response")
    ),
    responses(
        (status = 200, description = "Images uploaded today", body = Vec<Photo>),
        (status = 304, description = "Cached listing unchanged"),
        (status = 500, description = "Listing failed", body = ErrorResponse)
    )
)]
pub async fn list_photos(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    let settings = state.config.s3_settings()?;
    let storage = state
        .storage
        .get(&settings)
        .await
        .map_err(|e| AppError::ListingFailure(e.to_string()))?;

    let listing = state
        .photo_catalog
        .today(storage.as_ref(), Utc::now())
        .await?;

    let client_etag = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());

    let mut response = if listing.from_cache
        && client_etag == Some(listing.etag.as_str())
        && !has_nocache(query.as_deref())
    {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        tracing::debug!(
            count = listing.photos.len(),
            from_cache = listing.from_cache,
            "Serving photo listing"
        );
        Json(listing.photos.as_ref()).into_response()
    };
    cache_headers(&mut response, &listing.etag);
    Ok(response)
}
