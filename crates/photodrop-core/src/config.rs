//! Configuration module
//!
//! Environment-driven configuration for the upload service. Storage connection
//! parameters are optional at load time: the server starts without them and every
//! upload reports the gap as a configuration error.

use std::env;
use std::str::FromStr;

use crate::error::AppError;

// Common constants
const SERVER_PORT: u16 = 3000;
const MAX_FILE_SIZE_BYTES: u64 = 40 * 1024 * 1024;
const MULTIPART_THRESHOLD_BYTES: u64 = 5 * 1024 * 1024;
const MULTIPART_PART_SIZE_BYTES: u64 = 10 * 1024 * 1024;
/// S3 rejects non-final parts smaller than this.
const MIN_MULTIPART_PART_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const RATE_LIMIT_POINTS: u32 = 10;
const RATE_LIMIT_DURATION_SECS: u64 = 60;
const RETRY_COUNT: u32 = 3;
const RETRY_DELAY_MS: u64 = 500;
const TRUSTED_PROXY_COUNT: usize = 1;
const PHOTO_CACHE_TTL_SECS: u64 = 10;

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub log_format: String,
    // Storage connection
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    // Upload limits
    pub max_file_size_bytes: u64,
    pub multipart_threshold_bytes: u64,
    pub multipart_part_size_bytes: u64,
    // Admission control
    pub rate_limit_points: u32,
    pub rate_limit_duration_secs: u64,
    // Transfer retries
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub cors_origins: Vec<String>,
    pub upload_path_prefix: String,
    pub trusted_proxy_count: usize,
    pub photo_cache_ttl_secs: u64,
}

/// Fully resolved storage connection parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S3Settings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
    pub endpoint: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            log_format: "pretty".to_string(),
            s3_access_key_id: None,
            s3_secret_access_key: None,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            multipart_threshold_bytes: MULTIPART_THRESHOLD_BYTES,
            multipart_part_size_bytes: MULTIPART_PART_SIZE_BYTES,
            rate_limit_points: RATE_LIMIT_POINTS,
            rate_limit_duration_secs: RATE_LIMIT_DURATION_SECS,
            retry_count: RETRY_COUNT,
            retry_delay_ms: RETRY_DELAY_MS,
            cors_origins: Vec::new(),
            upload_path_prefix: String::new(),
            trusted_proxy_count: TRUSTED_PROXY_COUNT,
            photo_cache_ttl_secs: PHOTO_CACHE_TTL_SECS,
        }
    }
}

/// First non-empty value among `keys`.
fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(keys: &[&str], default: T) -> T {
    env_first(keys)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// Split a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env_first(&["ENVIRONMENT", "APP_ENV"])
            .unwrap_or_else(|| "development".to_string());

        let config = Config {
            server_port: env_first(&["PORT"])
                .unwrap_or_else(|| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            log_format: env_first(&["LOG_FORMAT"])
                .unwrap_or_else(|| "pretty".to_string())
                .to_lowercase(),
            s3_access_key_id: env_first(&["S3_ACCESS_KEY_ID"]),
            s3_secret_access_key: env_first(&["S3_SECRET_ACCESS_KEY"]),
            s3_bucket: env_first(&["S3_BUCKET_NAME", "NEXT_PUBLIC_S3_BUCKET_NAME"]),
            s3_region: env_first(&["S3_REGION"]),
            s3_endpoint: env_first(&["S3_ENDPOINT", "NEXT_PUBLIC_S3_ENDPOINT"]),
            max_file_size_bytes: env_parse(
                &["MAX_FILE_SIZE", "NEXT_PUBLIC_MAX_FILE_SIZE"],
                MAX_FILE_SIZE_BYTES,
            ),
            multipart_threshold_bytes: env_parse(
                &["MULTIPART_THRESHOLD"],
                MULTIPART_THRESHOLD_BYTES,
            ),
            multipart_part_size_bytes: env_parse(
                &["MULTIPART_PART_SIZE"],
                MULTIPART_PART_SIZE_BYTES,
            ),
            rate_limit_points: env_parse(&["RATE_LIMIT_POINTS"], RATE_LIMIT_POINTS),
            rate_limit_duration_secs: env_parse(
                &["RATE_LIMIT_DURATION"],
                RATE_LIMIT_DURATION_SECS,
            ),
            retry_count: env_parse(&["RETRY_COUNT"], RETRY_COUNT),
            retry_delay_ms: env_parse(&["RETRY_DELAY_MS"], RETRY_DELAY_MS),
            cors_origins: env_first(&["CORS_ORIGINS"])
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),
            upload_path_prefix: env_first(&["UPLOAD_PATH_PREFIX"]).unwrap_or_default(),
            trusted_proxy_count: env_parse(&["TRUSTED_PROXY_COUNT"], TRUSTED_PROXY_COUNT),
            photo_cache_ttl_secs: env_parse(&["PHOTO_CACHE_TTL_SECS"], PHOTO_CACHE_TTL_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Validate settings that cannot be repaired per request.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE must be greater than 0"));
        }

        if self.rate_limit_points == 0 {
            return Err(anyhow::anyhow!("RATE_LIMIT_POINTS must be greater than 0"));
        }

        if self.rate_limit_duration_secs == 0 {
            return Err(anyhow::anyhow!("RATE_LIMIT_DURATION must be greater than 0"));
        }

        if self.multipart_part_size_bytes < MIN_MULTIPART_PART_SIZE_BYTES {
            return Err(anyhow::anyhow!(
                "MULTIPART_PART_SIZE must be at least {} bytes",
                MIN_MULTIPART_PART_SIZE_BYTES
            ));
        }

        if self.is_production() && self.cors_allows_any_origin() {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        Ok(())
    }

    /// Wildcard entry present in the origin allow-list.
    pub fn cors_allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|origin| origin == "*")
    }

    /// Environment names of the storage settings that are not set.
    pub fn missing_storage_settings(&self) -> Vec<&'static str> {
        [
            ("S3_ACCESS_KEY_ID", &self.s3_access_key_id),
            ("S3_SECRET_ACCESS_KEY", &self.s3_secret_access_key),
            ("S3_BUCKET_NAME", &self.s3_bucket),
            ("S3_REGION", &self.s3_region),
            ("S3_ENDPOINT", &self.s3_endpoint),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| name)
        .collect()
    }

    /// Resolve the storage connection, failing with a configuration error when
    /// any parameter is absent.
    pub fn s3_settings(&self) -> Result<S3Settings, AppError> {
        let missing = self.missing_storage_settings();
        if !missing.is_empty() {
            return Err(AppError::Configuration(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let value = |field: &Option<String>| field.clone().unwrap_or_default();
        Ok(S3Settings {
            access_key_id: value(&self.s3_access_key_id),
            secret_access_key: value(&self.s3_secret_access_key),
            bucket: value(&self.s3_bucket),
            region: value(&self.s3_region),
            endpoint: value(&self.s3_endpoint),
        })
    }
}
