use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::error::{CivicError, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Hosted backend
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub image_bucket: String,
    /// Where session tokens are kept between runs.
    pub session_file: PathBuf,

    // AI provider
    pub gemini_api_key: String,
    pub gemini_model: String,

    // Startup
    pub health_check_timeout: Duration,
    pub startup_timeout: Duration,

    // Fallback coordinates for reports submitted without a location fix
    pub default_lat: f64,
    pub default_lng: f64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let supabase_url = required_env("SUPABASE_URL")?;
        url::Url::parse(&supabase_url)
            .map_err(|e| CivicError::Config(format!("SUPABASE_URL is not a valid URL: {e}")))?;

        Ok(Self {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_anon_key: required_env("SUPABASE_ANON_KEY")?,
            image_bucket: env::var("REPORT_IMAGE_BUCKET")
                .unwrap_or_else(|_| "report-images".to_string()),
            session_file: env::var("SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".civicwatch/session.json")),
            gemini_api_key: required_env("GEMINI_API_KEY")?,
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            health_check_timeout: Duration::from_millis(parsed_env("HEALTH_CHECK_TIMEOUT_MS", 2000)?),
            startup_timeout: Duration::from_millis(parsed_env("STARTUP_TIMEOUT_MS", 10_000)?),
            default_lat: parsed_env("DEFAULT_LAT", 18.5204)?,
            default_lng: parsed_env("DEFAULT_LNG", 73.8567)?,
        })
    }

    /// Log the non-secret parts of the configuration.
    pub fn log_redacted(&self) {
        info!(
            supabase_url = self.supabase_url.as_str(),
            image_bucket = self.image_bucket.as_str(),
            session_file = %self.session_file.display(),
            gemini_model = self.gemini_model.as_str(),
            health_check_timeout_ms = self.health_check_timeout.as_millis() as u64,
            startup_timeout_ms = self.startup_timeout.as_millis() as u64,
            default_lat = self.default_lat,
            default_lng = self.default_lng,
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CivicError::Config(format!("{key} environment variable is required"))),
    }
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CivicError::Config(format!("{key} must be a number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}
