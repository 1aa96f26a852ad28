//! Configuration module
//!
//! All settings come from the environment (optionally seeded from a `.env`
//! file). The tenant identifier is static per deployment and is read here once,
//! then passed explicitly into the stages.

use std::env;
use std::str::FromStr;

use crate::constants;
use crate::models::TenantId;
use crate::storage_types::StorageBackend;

const RELAY_MAX_WORKERS: usize = 4;
const QUEUE_WAIT_SECONDS: u64 = 20;
const QUEUE_BATCH_SIZE: usize = 10;
const IMAGE_FETCH_TIMEOUT_SECS: u64 = 60;
const IMAGE_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Which `ImageTransform` the optimize stage applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Identity,
    Reencode,
}

impl FromStr for TransformKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "identity" => Ok(TransformKind::Identity),
            "reencode" => Ok(TransformKind::Reencode),
            _ => Err(anyhow::anyhow!("Invalid image transform: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Relay deployment configuration
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub environment: String,
    pub tenant_id: TenantId,
    pub batch_chunk_size: usize,
    // Worker configuration
    pub max_workers: usize,
    pub queue_wait_seconds: u64,
    pub queue_batch_size: usize,
    // Queue endpoints (partner side and central system side)
    pub partner_queue_url_prefix: Option<String>,
    pub central_queue_url_prefix: Option<String>,
    pub aws_region: Option<String>,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub working_container: String,
    pub public_container: String,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Image pipeline configuration
    pub image_fetch_timeout_secs: u64,
    pub image_max_bytes: usize,
    pub image_transform: TransformKind,
    pub log_format: LogFormat,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let tenant_id = env::var("TENANT_ID")
            .map_err(|_| anyhow::anyhow!("TENANT_ID must be set for the relay deployment"))?;

        let storage_backend = env::var("STORAGE_BACKEND")
            .ok()
            .map(|s| s.parse::<StorageBackend>())
            .transpose()?
            .unwrap_or(StorageBackend::S3);

        let image_transform = env::var("IMAGE_TRANSFORM")
            .ok()
            .map(|s| s.parse::<TransformKind>())
            .transpose()?
            .unwrap_or(TransformKind::Identity);

        let log_format = env::var("LOG_FORMAT")
            .ok()
            .map(|s| s.parse::<LogFormat>())
            .transpose()?
            .unwrap_or(LogFormat::Compact);

        let config = RelayConfig {
            environment,
            tenant_id: TenantId::new(tenant_id.trim()),
            batch_chunk_size: env::var("BATCH_CHUNK_SIZE")
                .unwrap_or_else(|_| constants::DEFAULT_CHUNK_SIZE.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BATCH_CHUNK_SIZE must be a positive integer"))?,
            max_workers: env::var("RELAY_MAX_WORKERS")
                .unwrap_or_else(|_| RELAY_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(RELAY_MAX_WORKERS),
            queue_wait_seconds: env::var("QUEUE_WAIT_SECONDS")
                .unwrap_or_else(|_| QUEUE_WAIT_SECONDS.to_string())
                .parse()
                .unwrap_or(QUEUE_WAIT_SECONDS),
            queue_batch_size: env::var("QUEUE_BATCH_SIZE")
                .unwrap_or_else(|_| QUEUE_BATCH_SIZE.to_string())
                .parse()
                .unwrap_or(QUEUE_BATCH_SIZE),
            partner_queue_url_prefix: env::var("PARTNER_QUEUE_URL_PREFIX")
                .ok()
                .filter(|s| !s.is_empty()),
            central_queue_url_prefix: env::var("CENTRAL_QUEUE_URL_PREFIX")
                .ok()
                .filter(|s| !s.is_empty()),
            aws_region: env::var("AWS_REGION").ok(),
            storage_backend,
            working_container: env::var("WORKING_CONTAINER")
                .unwrap_or_else(|_| constants::WORKING_CONTAINER.to_string()),
            public_container: env::var("PUBLIC_CONTAINER")
                .unwrap_or_else(|_| constants::PUBLIC_CONTAINER.to_string()),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            image_fetch_timeout_secs: env::var("IMAGE_FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| IMAGE_FETCH_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(IMAGE_FETCH_TIMEOUT_SECS),
            image_max_bytes: env::var("IMAGE_MAX_BYTES")
                .unwrap_or_else(|_| IMAGE_MAX_BYTES.to_string())
                .parse()
                .unwrap_or(IMAGE_MAX_BYTES),
            image_transform,
            log_format,
        };

        config.validate()?;
        Ok(config)
    }

    /// Configuration for tests and local dry runs: in-memory stores, default limits.
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        RelayConfig {
            environment: "development".to_string(),
            tenant_id: TenantId::new(tenant_id),
            batch_chunk_size: constants::DEFAULT_CHUNK_SIZE,
            max_workers: RELAY_MAX_WORKERS,
            queue_wait_seconds: QUEUE_WAIT_SECONDS,
            queue_batch_size: QUEUE_BATCH_SIZE,
            partner_queue_url_prefix: None,
            central_queue_url_prefix: None,
            aws_region: None,
            storage_backend: StorageBackend::Memory,
            working_container: constants::WORKING_CONTAINER.to_string(),
            public_container: constants::PUBLIC_CONTAINER.to_string(),
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
            local_storage_base_url: None,
            image_fetch_timeout_secs: IMAGE_FETCH_TIMEOUT_SECS,
            image_max_bytes: IMAGE_MAX_BYTES,
            image_transform: TransformKind::Identity,
            log_format: LogFormat::Compact,
        }
    }

    /// Check if the relay is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.tenant_id.as_str().is_empty() {
            return Err(anyhow::anyhow!("TENANT_ID must not be empty"));
        }

        if self.batch_chunk_size == 0 {
            return Err(anyhow::anyhow!("BATCH_CHUNK_SIZE must be greater than zero"));
        }

        if self.max_workers == 0 {
            return Err(anyhow::anyhow!("RELAY_MAX_WORKERS must be greater than zero"));
        }

        if self.working_container == self.public_container {
            return Err(anyhow::anyhow!(
                "WORKING_CONTAINER and PUBLIC_CONTAINER must differ"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {
                if self.is_production() {
                    return Err(anyhow::anyhow!(
                        "memory storage backend cannot be used in production"
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.aws_region.as_deref())
    }
}
