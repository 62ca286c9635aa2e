//! Per-request configuration and origin checks.

use std::sync::Arc;

use photodrop_core::{AppError, Config, S3Settings};

/// Runs before any expensive work on an upload request.
#[derive(Clone)]
pub struct RequestValidator {
    config: Arc<Config>,
}

impl RequestValidator {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Resolve storage settings, then gate the origin.
    ///
    /// Missing storage settings are a configuration error (generic 500). A disallowed
    /// origin is rejected here so it never spends rate-limit quota.
    pub fn validate(&self, origin: Option<&str>) -> Result<S3Settings, AppError> {
        let settings = self.config.s3_settings()?;
        self.check_origin(origin)?;
        Ok(settings)
    }

    /// Requests without an `Origin` header, and all requests when no allow-list is
    /// configured, pass.
    pub fn check_origin(&self, origin: Option<&str>) -> Result<(), AppError> {
        let allowed = &self.config.cors_origins;
        let Some(origin) = origin else {
            return Ok(());
        };

        if allowed.is_empty() || self.config.cors_allows_any_origin() {
            return Ok(());
        }

        if allowed.iter().any(|o| o == origin) {
            Ok(())
        } else {
            Err(AppError::CorsRejected {
                origin: origin.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(origins: &[&str]) -> RequestValidator {
        RequestValidator::new(Arc::new(Config {
            s3_access_key_id: Some("key".into()),
            s3_secret_access_key: Some("secret".into()),
            s3_bucket: Some("photos".into()),
            s3_region: Some("us-east-1".into()),
            s3_endpoint: Some("http://localhost:9000".into()),
            cors_origins: origins.iter().map(|o| o.to_string()).collect(),
            ..Config::default()
        }))
    }

    #[test]
    fn test_no_allow_list_passes_everything() {
        assert!(validator(&[]).check_origin(Some("https://any.example")).is_ok());
    }

    #[test]
    fn test_wildcard_passes_everything() {
        assert!(validator(&["*"])
            .check_origin(Some("https://any.example"))
            .is_ok());
    }

    #[test]
    fn test_listed_origin_passes() {
        let validator = validator(&["https://a.example", "https://b.example"]);
        assert!(validator.check_origin(Some("https://b.example")).is_ok());
    }

    #[test]
    fn test_unlisted_origin_rejected() {
        let result = validator(&["https://a.example"]).check_origin(Some("https://evil.example"));
        assert_eq!(
            result,
            Err(AppError::CorsRejected {
                origin: "https://evil.example".into()
            })
        );
    }

    #[test]
    fn test_missing_origin_passes() {
        assert!(validator(&["https://a.example"]).check_origin(None).is_ok());
    }

    #[test]
    fn test_configuration_checked_before_origin() {
        let validator = RequestValidator::new(Arc::new(Config {
            cors_origins: vec!["https://a.example".into()],
            ..Config::default()
        }));
        assert!(matches!(
            validator.validate(Some("https://evil.example")),
            Err(AppError::Configuration(_))
        ));
    }
}
