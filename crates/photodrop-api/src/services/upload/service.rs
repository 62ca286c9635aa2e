//! Upload pipeline service
//!
//! Stages run strictly in order, each able to end the request:
//! request validation, rate limiting, form extraction, content authentication,
//! key generation, storage transfer. The buffered file is released exactly once
//! after extraction, whatever happens next.

use std::sync::Arc;

use axum::extract::{FromRequest, Multipart, Request};
use chrono::Utc;
use photodrop_core::{AppError, Config, S3Settings, StorageKey, UploadOutcome};
use photodrop_infra::{RateLimitDecision, RateLimiter};
use photodrop_processing::{ContentAuthenticator, ParsedFile};
use photodrop_storage::{generate_storage_key, StorageProvider};

use super::executor::{UploadExecutor, UploadExecutorConfig};
use crate::constants::MULTIPART_OVERHEAD_BYTES;
use crate::utils::form::FormExtractor;
use crate::validation::RequestValidator;

/// One inbound upload.
pub struct UploadRequest {
    pub client_ip: String,
    pub origin: Option<String>,
    /// Declared `Content-Length`, if any
    pub content_length: Option<u64>,
    pub request: Request,
}

#[derive(Clone)]
pub struct UploadService {
    config: Arc<Config>,
    validator: RequestValidator,
    rate_limiter: Arc<RateLimiter>,
    extractor: FormExtractor,
    authenticator: ContentAuthenticator,
    executor: UploadExecutor,
    storage: Arc<StorageProvider>,
}

impl UploadService {
    pub fn new(
        config: Arc<Config>,
        rate_limiter: Arc<RateLimiter>,
        storage: Arc<StorageProvider>,
    ) -> Self {
        Self {
            validator: RequestValidator::new(config.clone()),
            extractor: FormExtractor::new(config.max_file_size_bytes),
            authenticator: ContentAuthenticator::new(),
            executor: UploadExecutor::new(UploadExecutorConfig::from(config.as_ref())),
            config,
            rate_limiter,
            storage,
        }
    }

    /// Run the whole pipeline for one request.
    pub async fn process(&self, request: UploadRequest) -> UploadOutcome {
        match self.run(request).await {
            Ok((key, url)) => UploadOutcome::Success { key, url },
            Err(error) => error.into(),
        }
    }

    async fn run(&self, request: UploadRequest) -> Result<(StorageKey, String), AppError> {
        let settings = self.validator.validate(request.origin.as_deref())?;

        if let RateLimitDecision::Denied { retry_after_secs } =
            self.rate_limiter.consume(&request.client_ip).await
        {
            tracing::warn!(retry_after = retry_after_secs, "Rate limit exceeded");
            return Err(AppError::RateLimited { retry_after_secs });
        }

        self.check_content_length(request.content_length)?;

        tracing::debug!("Parsing form data");
        let multipart = Multipart::from_request(request.request, &())
            .await
            .map_err(|rejection| AppError::MalformedRequest(rejection.body_text()))?;
        let mut file = self.extractor.extract(multipart).await?;

        let result = self.store(&settings, &file).await;
        file.release();
        result
    }

    /// Reject bodies whose declared length can never fit before reading them.
    fn check_content_length(&self, content_length: Option<u64>) -> Result<(), AppError> {
        let limit = self.config.max_file_size_bytes;
        match content_length {
            Some(length) if length > limit.saturating_add(MULTIPART_OVERHEAD_BYTES) => {
                Err(AppError::PayloadTooLarge { limit_bytes: limit })
            }
            _ => Ok(()),
        }
    }

    async fn store(
        &self,
        settings: &S3Settings,
        file: &ParsedFile,
    ) -> Result<(StorageKey, String), AppError> {
        self.authenticator.authenticate(file).await?;

        let key = generate_storage_key(
            &self.config.upload_path_prefix,
            &file.original_filename,
            Utc::now(),
        );

        tracing::info!(
            file_name = %key.file_name(),
            file_size = file.size,
            mime_type = %file.content_type,
            "Starting file upload"
        );

        let storage = self
            .storage
            .get(settings)
            .await
            .map_err(|e| AppError::PermanentStorageFailure(e.to_string()))?;

        self.executor.upload(storage.as_ref(), file, &key).await?;

        let url = storage.public_url(key.as_str());
        Ok((key, url))
    }
}
