//! Route configuration and setup.
//!
//! Health checks live in [health](health).

pub(crate) mod health;

use crate::constants::MULTIPART_OVERHEAD_BYTES;
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use photodrop_core::Config;
use photodrop_infra::request_id_middleware;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let body_limit = usize::try_from(
        config
            .max_file_size_bytes
            .saturating_add(MULTIPART_OVERHEAD_BYTES),
    )
    .unwrap_or(usize::MAX);

    let app = Router::new()
        .route(
            "/upload",
            post(handlers::upload::upload_image).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/photos", get(handlers::photos::list_photos))
        .route(
            "/health",
            get({
                let state = state.clone();
                move || async move { health::liveness_check(state).await }
            }),
        )
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
///
/// An empty allow-list, or one containing `*`, allows any origin.
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    if config.cors_origins.is_empty() || config.cors_allows_any_origin() {
        if config.cors_allows_any_origin() {
            tracing::warn!("CORS configured to allow all origins - not recommended for production");
        }
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any));
    }

    let origins = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(Any))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use photodrop_storage::StorageProvider;
    use tower::ServiceExt;

    fn router(config: Config) -> Router {
        let state = Arc::new(AppState::new(config.clone(), StorageProvider::new()));
        setup_routes(&config, state).unwrap()
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/upload")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_preflight_for_listed_origin() {
        let app = router(Config {
            cors_origins: vec!["https://ok.example".to_string()],
            ..Config::default()
        });
        let response = app.oneshot(preflight("https://ok.example")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://ok.example"
        );
    }

    #[tokio::test]
    async fn test_preflight_for_unlisted_origin_has_no_allow_header() {
        let app = router(Config {
            cors_origins: vec!["https://ok.example".to_string()],
            ..Config::default()
        });
        let response = app.oneshot(preflight("https://evil.example")).await.unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn test_empty_origin_list_allows_any() {
        let app = router(Config::default());
        let response = app.oneshot(preflight("https://any.example")).await.unwrap();
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn test_setup_cors_rejects_invalid_origin() {
        let config = Config {
            cors_origins: vec!["https://ok.example".to_string(), "bad\norigin".to_string()],
            ..Config::default()
        };
        assert!(setup_cors(&config).is_err());
    }

    #[test]
    fn test_setup_cors_accepts_list() {
        let config = Config {
            cors_origins: vec!["https://ok.example".to_string()],
            ..Config::default()
        };
        assert!(setup_cors(&config).is_ok());
    }
}
