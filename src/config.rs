use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::domain::documents::StorageType;
use crate::pipeline::PipelineSettings;
use crate::services::ai_client::DEFAULT_GEMINI_BASE_URL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Database (in-memory store when unset)
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // Redis (in-process cache when unset)
    pub redis_url: Option<String>,
    pub analysis_cache_ttl_seconds: u64,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Blob storage
    pub storage_backend: StorageType,
    pub local_storage_dir: String,
    pub blob_service_url: Option<String>,
    pub blob_service_token: Option<String>,

    // Parse service (local pdf-extract when unset)
    pub parse_service_url: Option<String>,
    pub parse_service_api_key: Option<String>,
    pub parse_timeout_seconds: u64,
    pub parse_poll_interval_seconds: u64,

    // Gemini (AI fallback and chat disabled when unset)
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub ai_timeout_seconds: u64,

    // Pipeline heuristics
    pub stall_threshold_seconds: u64,
    pub alternative_confidence_factor: f64,
    pub ai_fallback_min_elements: usize,

    pub max_upload_bytes: usize,
}

/// Non-empty variable, if set.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Optional variable that must parse as an absolute http(s) URL when set.
fn optional_url(name: &str) -> Result<Option<String>> {
    optional(name).map(|value| validate_url(name, value)).transpose()
}

fn validate_url(name: &str, value: String) -> Result<String> {
    let url = Url::parse(&value).with_context(|| format!("{name} is not a valid URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("{name} must use http or https");
    }
    Ok(value)
}

fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // Database
        let database_url = optional("DATABASE_URL");
        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10);

        // Redis
        let redis_url = optional("REDIS_URL");
        let analysis_cache_ttl_seconds = parse_or("ANALYSIS_CACHE_TTL_SECONDS", 3600); // 1 hour

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Blob storage
        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .parse::<StorageType>()
            .map_err(anyhow::Error::msg)
            .context("Invalid STORAGE_BACKEND")?;
        let local_storage_dir =
            env::var("LOCAL_STORAGE_DIR").unwrap_or_else(|_| "./uploads".to_string());
        let blob_service_url = optional_url("BLOB_SERVICE_URL")?;
        let blob_service_token = optional("BLOB_SERVICE_TOKEN");

        if storage_backend == StorageType::BlobService && blob_service_url.is_none() {
            anyhow::bail!("BLOB_SERVICE_URL must be set when STORAGE_BACKEND=blob_service");
        }
        if storage_backend == StorageType::Database && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORAGE_BACKEND=database");
        }

        // Parse service
        let parse_service_url = optional_url("PARSE_SERVICE_URL")?;
        let parse_service_api_key = optional("PARSE_SERVICE_API_KEY");
        let parse_timeout_seconds = parse_or("PARSE_TIMEOUT_SECONDS", 600); // 10 minutes
        let parse_poll_interval_seconds = parse_or("PARSE_POLL_INTERVAL_SECONDS", 3);

        // Gemini
        let gemini_api_key = optional("GEMINI_API_KEY");
        let gemini_model =
            env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string());
        let gemini_base_url = optional_url("GEMINI_BASE_URL")?
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());
        let ai_timeout_seconds = parse_or("AI_TIMEOUT_SECONDS", 120);

        // Pipeline heuristics
        let stall_threshold_seconds = parse_or("STALL_THRESHOLD_SECONDS", 120);
        let alternative_confidence_factor: f64 = parse_or("ALTERNATIVE_CONFIDENCE_FACTOR", 0.8);
        if !(0.0..=1.0).contains(&alternative_confidence_factor) {
            anyhow::bail!("ALTERNATIVE_CONFIDENCE_FACTOR must be between 0 and 1");
        }
        let ai_fallback_min_elements = parse_or("AI_FALLBACK_MIN_ELEMENTS", 1);

        let max_upload_bytes = parse_or("MAX_UPLOAD_BYTES", 25 * 1024 * 1024);

        Ok(Settings {
            env,
            server_addr,
            database_url,
            database_max_connections,
            redis_url,
            analysis_cache_ttl_seconds,
            cors_allow_origins,
            storage_backend,
            local_storage_dir,
            blob_service_url,
            blob_service_token,
            parse_service_url,
            parse_service_api_key,
            parse_timeout_seconds,
            parse_poll_interval_seconds,
            gemini_api_key,
            gemini_model,
            gemini_base_url,
            ai_timeout_seconds,
            stall_threshold_seconds,
            alternative_confidence_factor,
            ai_fallback_min_elements,
            max_upload_bytes,
        })
    }

    /// Defaults suitable for tests and local runs without any environment.
    pub fn for_tests() -> Self {
        Self {
            env: Environment::Dev,
            server_addr: "127.0.0.1:0".to_string(),
            database_url: None,
            database_max_connections: 1,
            redis_url: None,
            analysis_cache_ttl_seconds: 3600,
            cors_allow_origins: vec!["http://localhost:3000".to_string()],
            storage_backend: StorageType::Local,
            local_storage_dir: "./uploads".to_string(),
            blob_service_url: None,
            blob_service_token: None,
            parse_service_url: None,
            parse_service_api_key: None,
            parse_timeout_seconds: 600,
            parse_poll_interval_seconds: 3,
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            ai_timeout_seconds: 120,
            stall_threshold_seconds: 120,
            alternative_confidence_factor: 0.8,
            ai_fallback_min_elements: 1,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }

    pub fn pipeline(&self) -> PipelineSettings {
        PipelineSettings {
            stall_threshold: Duration::from_secs(self.stall_threshold_seconds),
            parse_timeout: Duration::from_secs(self.parse_timeout_seconds),
            ai_fallback_min_elements: self.ai_fallback_min_elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!(Environment::from_str("production"), Environment::Prod);
        assert_eq!(Environment::from_str("STAGING"), Environment::Staging);
        assert!(Environment::from_str("anything").is_dev());
    }

    #[test]
    fn test_url_validation() {
        assert!(validate_url("X", "http://parse.local:8000".to_string()).is_ok());
        assert!(validate_url("X", "not a url".to_string()).is_err());
        assert!(validate_url("X", "ftp://files.local".to_string()).is_err());
    }

    #[test]
    fn test_pipeline_settings_follow_config() {
        let mut settings = Settings::for_tests();
        settings.stall_threshold_seconds = 30;
        let pipeline = settings.pipeline();
        assert_eq!(pipeline.stall_threshold, Duration::from_secs(30));
        assert_eq!(pipeline.parse_timeout, Duration::from_secs(600));
    }
}
