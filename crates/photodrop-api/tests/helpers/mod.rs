//! Test helpers: build the router around an in-memory storage backend.
//!
//! Run from workspace root: `cargo test -p photodrop-api`.

pub mod fixtures;
pub mod storage;

use std::sync::Arc;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use photodrop_api::setup::build_app;
use photodrop_api::state::AppState;
use photodrop_core::Config;
use photodrop_storage::StorageProvider;

use storage::RecordingStorage;

/// Configuration with every storage setting present and a fast retry delay.
pub fn test_config() -> Config {
    Config {
        s3_access_key_id: Some("test-access-key".to_string()),
        s3_secret_access_key: Some("test-secret-key".to_string()),
        s3_bucket: Some("photos".to_string()),
        s3_region: Some("us-east-1".to_string()),
        s3_endpoint: Some("http://localhost:9000".to_string()),
        retry_delay_ms: 1,
        ..Config::default()
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub storage: Arc<RecordingStorage>,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(test_config(), RecordingStorage::new())
}

pub fn setup_test_app_with(config: Config, storage: RecordingStorage) -> TestApp {
    let storage = Arc::new(storage);
    let (state, router) = build_app(config, StorageProvider::with_storage(storage.clone()))
        .expect("Failed to build app");
    let server = TestServer::new(router.into_make_service()).expect("Failed to create test server");
    TestApp {
        server,
        storage,
        state,
    }
}

/// Single-file form under the `file` field.
pub fn file_form(bytes: Vec<u8>, file_name: &str, mime_type: &str) -> MultipartForm {
    let part = Part::bytes(bytes::Bytes::from(bytes))
        .file_name(file_name.to_string())
        .mime_type(mime_type.to_string());
    MultipartForm::new().add_part("file", part)
}
