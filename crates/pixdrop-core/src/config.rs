//! Configuration module
//!
//! Configuration is read once from the environment (and `.env`) at startup. The values
//! reach the gates as explicit policy structs; nothing below this module reads the
//! environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    BYTES_PER_MB, DEFAULT_LIST_PAGE_SIZE, DEFAULT_PRESIGNED_URL_EXPIRY_SECS, MAX_DELETE_BATCH,
};
use crate::models::{CapacityPolicy, IngestionPolicy, QuotaPolicy, SweepPolicy};
use crate::storage_types::StorageBackend;

const MAX_FILE_SIZE_MB: u64 = 20;
const MAX_UPLOADS_PER_WINDOW: u32 = 5;
const RATE_WINDOW_HOURS: u32 = 6;
const MAX_STORAGE_GB: f64 = 4.5;
const IMAGE_EXPIRY_HOURS: u32 = 6;
const SWEEP_INTERVAL_SECS: u64 = 3600;
const QUOTA_CONFLICT_ATTEMPTS: u32 = 3;

/// Process-level settings.
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    /// Deployment stage (`dev`, `prod`, ...).
    pub environment: String,
    /// Number of reverse proxies whose X-Forwarded-For entries are trusted.
    pub trusted_proxy_count: usize,
    pub log_format: String,
}

/// Object store settings.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub list_page_size: usize,
}

/// Quota, capacity and lifecycle limits.
#[derive(Clone, Debug)]
pub struct LimitsConfig {
    /// Explicit switch for the rate and capacity checks. Defaults to on in production only.
    pub quota_enforced: bool,
    pub max_file_size_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub max_uploads_per_window: u32,
    pub rate_window_hours: u32,
    pub max_storage_gb: f64,
    pub quota_conditional_writes: bool,
    pub image_expiry_hours: u32,
    pub sweep_prefixes: Vec<String>,
    pub sweep_batch_size: usize,
    /// 0 disables the in-process sweep schedule.
    pub sweep_interval_secs: u64,
    pub presigned_url_expiry_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub base: BaseConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
}

fn is_production_stage(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Boolean switch. Unset or blank falls back to `default`; anything unrecognised is an error.
fn parse_flag(name: &str, value: Option<String>, default: bool) -> Result<bool, anyhow::Error> {
    let Some(raw) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "0" | "no" | "n" | "off" => Ok(false),
        other => anyhow::bail!(
            "{} must be a boolean (true/false, yes/no, on/off, 1/0), got {:?}",
            name,
            other
        ),
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load `.env` (if any) and read configuration from the process environment.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| names.iter().find_map(|name| lookup(name));

        let environment = first(&["STAGE", "ENVIRONMENT", "APP_ENV"])
            .unwrap_or_else(|| "dev".to_string());
        let is_production = is_production_stage(&environment);

        let cors_origins = split_list(&lookup("CORS_ORIGINS").unwrap_or_else(|| "*".to_string()));

        let base = BaseConfig {
            server_port: lookup("PORT")
                .unwrap_or_else(|| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            environment,
            trusted_proxy_count: parse_or(lookup("TRUSTED_PROXY_COUNT"), 0),
            log_format: lookup("LOG_FORMAT")
                .unwrap_or_else(|| "pretty".to_string())
                .to_lowercase(),
        };

        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(value) => Some(value.parse::<StorageBackend>()?),
            None => None,
        };

        let storage = StorageConfig {
            storage_backend,
            s3_bucket: first(&["S3_BUCKET", "BUCKET_NAME"]).filter(|s| !s.is_empty()),
            s3_region: lookup("S3_REGION").filter(|s| !s.is_empty()),
            s3_endpoint: lookup("S3_ENDPOINT").filter(|s| !s.is_empty()),
            aws_region: first(&["AWS_REGION", "REGION"]).filter(|s| !s.is_empty()),
            local_storage_path: lookup("LOCAL_STORAGE_PATH").filter(|s| !s.is_empty()),
            local_storage_base_url: lookup("LOCAL_STORAGE_BASE_URL").filter(|s| !s.is_empty()),
            list_page_size: parse_or(lookup("LIST_PAGE_SIZE"), DEFAULT_LIST_PAGE_SIZE),
        };

        let max_file_size_mb = parse_or(lookup("MAX_FILE_SIZE_MB"), MAX_FILE_SIZE_MB);

        let limits = LimitsConfig {
            quota_enforced: parse_flag(
                "QUOTA_ENFORCED",
                lookup("QUOTA_ENFORCED"),
                is_production,
            )?,
            max_file_size_bytes: max_file_size_mb * BYTES_PER_MB,
            allowed_content_types: lookup("ALLOWED_CONTENT_TYPES")
                .unwrap_or_else(|| "image/jpeg,image/png,image/gif,image/webp".to_string())
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            max_uploads_per_window: parse_or(
                lookup("MAX_UPLOADS_PER_WINDOW"),
                MAX_UPLOADS_PER_WINDOW,
            ),
            rate_window_hours: parse_or(lookup("RATE_WINDOW_HOURS"), RATE_WINDOW_HOURS),
            max_storage_gb: parse_or(lookup("MAX_STORAGE_GB"), MAX_STORAGE_GB),
            quota_conditional_writes: parse_flag(
                "QUOTA_CONDITIONAL_WRITES",
                lookup("QUOTA_CONDITIONAL_WRITES"),
                false,
            )?,
            image_expiry_hours: parse_or(lookup("IMAGE_EXPIRY_HOURS"), IMAGE_EXPIRY_HOURS),
            sweep_prefixes: split_list(
                &lookup("SWEEP_PREFIXES")
                    .unwrap_or_else(|| "uploads/,processed/,thumbnails/".to_string()),
            ),
            sweep_batch_size: parse_or(lookup("SWEEP_BATCH_SIZE"), MAX_DELETE_BATCH),
            sweep_interval_secs: parse_or(lookup("SWEEP_INTERVAL_SECS"), SWEEP_INTERVAL_SECS),
            presigned_url_expiry_secs: parse_or(
                lookup("PRESIGNED_URL_EXPIRY_SECS"),
                DEFAULT_PRESIGNED_URL_EXPIRY_SECS,
            ),
        };

        let config = Config {
            base,
            storage,
            limits,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() && self.base.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.limits.rate_window_hours == 0 {
            return Err(anyhow::anyhow!("RATE_WINDOW_HOURS must be greater than 0"));
        }

        if self.limits.max_storage_gb <= 0.0 {
            return Err(anyhow::anyhow!("MAX_STORAGE_GB must be greater than 0"));
        }

        if self.limits.sweep_batch_size == 0 || self.limits.sweep_batch_size > MAX_DELETE_BATCH {
            return Err(anyhow::anyhow!(
                "SWEEP_BATCH_SIZE must be between 1 and {}",
                MAX_DELETE_BATCH
            ));
        }

        if self.storage.list_page_size == 0 {
            return Err(anyhow::anyhow!("LIST_PAGE_SIZE must be greater than 0"));
        }

        if self.limits.sweep_prefixes.iter().any(|p| !p.ends_with('/')) {
            return Err(anyhow::anyhow!(
                "SWEEP_PREFIXES entries must end with '/'"
            ));
        }

        let backend = self.storage_backend();
        match backend {
            StorageBackend::S3 => {
                if self.storage.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region().is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.storage.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.storage.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {}
        }

        Ok(())
    }

    /// Check if the application is running in the production stage
    pub fn is_production(&self) -> bool {
        is_production_stage(&self.base.environment)
    }

    pub fn environment(&self) -> &str {
        &self.base.environment
    }

    pub fn server_port(&self) -> u16 {
        self.base.server_port
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.storage.storage_backend.unwrap_or(StorageBackend::S3)
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.storage
            .s3_region
            .as_deref()
            .or(self.storage.aws_region.as_deref())
    }

    pub fn presigned_url_expiry(&self) -> Duration {
        Duration::from_secs(self.limits.presigned_url_expiry_secs)
    }

    pub fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            enforced: self.limits.quota_enforced,
            max_uploads_per_window: self.limits.max_uploads_per_window,
            window_hours: self.limits.rate_window_hours,
            conditional_writes: self.limits.quota_conditional_writes,
            max_conflict_attempts: QUOTA_CONFLICT_ATTEMPTS,
        }
    }

    pub fn capacity_policy(&self) -> CapacityPolicy {
        CapacityPolicy {
            enforced: self.limits.quota_enforced,
            ceiling_gb: self.limits.max_storage_gb,
        }
    }

    pub fn ingestion_policy(&self) -> IngestionPolicy {
        IngestionPolicy {
            max_file_size_bytes: self.limits.max_file_size_bytes,
            allowed_content_types: self.limits.allowed_content_types.clone(),
        }
    }

    pub fn sweep_policy(&self) -> SweepPolicy {
        SweepPolicy {
            retention_hours: self.limits.image_expiry_hours,
            prefixes: self.limits.sweep_prefixes.clone(),
            batch_size: self.limits.sweep_batch_size,
            interval: Duration::from_secs(self.limits.sweep_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_disable_quotas_outside_production() {
        let config = config_from(&[("STORAGE_BACKEND", "memory")]).unwrap();
        assert!(!config.is_production());
        assert!(!config.quota_policy().enforced);
        assert!(!config.capacity_policy().enforced);
        assert_eq!(config.quota_policy().max_uploads_per_window, 5);
        assert_eq!(config.sweep_policy().retention_hours, 6);
        assert_eq!(config.ingestion_policy().max_file_size_bytes, 20 * BYTES_PER_MB);
        assert_eq!(config.presigned_url_expiry(), Duration::from_secs(3600));
    }

    #[test]
    fn production_stage_enforces_quotas() {
        let config = config_from(&[
            ("STAGE", "prod"),
            ("CORS_ORIGINS", "https://app.example.com"),
            ("STORAGE_BACKEND", "memory"),
        ])
        .unwrap();
        assert!(config.quota_policy().enforced);
        assert!(config.capacity_policy().enforced);
    }

    #[test]
    fn explicit_flag_overrides_stage() {
        let config = config_from(&[("STORAGE_BACKEND", "memory"), ("QUOTA_ENFORCED", "true")])
            .unwrap();
        assert!(config.quota_policy().enforced);
    }

    #[test]
    fn quota_switch_accepts_common_spellings() {
        for value in ["yes", "ON", "Y", "1", " true "] {
            let config =
                config_from(&[("STORAGE_BACKEND", "memory"), ("QUOTA_ENFORCED", value)]).unwrap();
            assert!(config.quota_policy().enforced, "{value:?} should enable quotas");
        }

        let config = config_from(&[
            ("STAGE", "prod"),
            ("CORS_ORIGINS", "https://app.example.com"),
            ("STORAGE_BACKEND", "memory"),
            ("QUOTA_ENFORCED", "off"),
        ])
        .unwrap();
        assert!(!config.quota_policy().enforced);
    }

    #[test]
    fn blank_quota_switch_uses_stage_default() {
        let config =
            config_from(&[("STORAGE_BACKEND", "memory"), ("QUOTA_ENFORCED", "")]).unwrap();
        assert!(!config.quota_policy().enforced);
    }

    #[test]
    fn unrecognised_switch_values_are_rejected() {
        let err = config_from(&[("STORAGE_BACKEND", "memory"), ("QUOTA_ENFORCED", "maybe")])
            .unwrap_err();
        assert!(err.to_string().contains("QUOTA_ENFORCED"));

        let err = config_from(&[
            ("STORAGE_BACKEND", "memory"),
            ("QUOTA_CONDITIONAL_WRITES", "enabled"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("QUOTA_CONDITIONAL_WRITES"));
    }

    #[test]
    fn conditional_writes_switch_accepts_yes() {
        let config = config_from(&[
            ("STORAGE_BACKEND", "memory"),
            ("QUOTA_CONDITIONAL_WRITES", "yes"),
        ])
        .unwrap();
        assert!(config.quota_policy().conditional_writes);
    }

    #[test]
    fn wildcard_cors_rejected_in_production() {
        let err = config_from(&[("STAGE", "production"), ("STORAGE_BACKEND", "memory")])
            .unwrap_err();
        assert!(err.to_string().contains("CORS_ORIGINS"));
    }

    #[test]
    fn s3_backend_requires_bucket_and_region() {
        assert!(config_from(&[]).is_err());
        let config = config_from(&[("BUCKET_NAME", "images"), ("REGION", "eu-west-1")]).unwrap();
        assert_eq!(config.storage_backend(), StorageBackend::S3);
        assert_eq!(config.s3_region(), Some("eu-west-1"));
    }

    #[test]
    fn oversized_batch_rejected() {
        let err = config_from(&[("STORAGE_BACKEND", "memory"), ("SWEEP_BATCH_SIZE", "5000")])
            .unwrap_err();
        assert!(err.to_string().contains("SWEEP_BATCH_SIZE"));
    }
}
