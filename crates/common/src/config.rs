//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables so the same
//! binary runs against any backend without a rebuild.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_STORAGE_PATH: &str = ".shelfdesk/storage.json";

/// Default number of records requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page size the backend accepts
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Base URL of the lending backend
    pub api_base_url: String,

    /// Durable key/value file holding the credential and UI flags
    pub storage_path: PathBuf,

    /// Records requested per page
    pub page_size: u32,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    /// Remaining lifetime at which the renewal prompt is shown
    pub expiry_warning_secs: i64,

    /// Delay before a fresh telemetry badge becomes visible
    pub badge_reveal_ms: u64,

    /// How long a telemetry badge stays visible
    pub badge_display_ms: u64,

    /// Runtime configuration
    pub rust_log: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: 10,
            expiry_warning_secs: 60,
            badge_reveal_ms: 200,
            badge_display_ms: 4000,
            rust_log: "shelfdesk=info".to_string(),
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let defaults = Self::default();

        let config = Self {
            api_base_url: env::var("SHELFDESK_API_URL").unwrap_or(defaults.api_base_url),
            storage_path: env::var("SHELFDESK_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            page_size: parse_var("SHELFDESK_PAGE_SIZE", defaults.page_size)?
                .clamp(1, MAX_PAGE_SIZE),
            request_timeout_secs: parse_var(
                "SHELFDESK_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            expiry_warning_secs: parse_var(
                "SHELFDESK_EXPIRY_WARNING_SECS",
                defaults.expiry_warning_secs,
            )?,
            badge_reveal_ms: parse_var("SHELFDESK_BADGE_REVEAL_MS", defaults.badge_reveal_ms)?,
            badge_display_ms: parse_var("SHELFDESK_BADGE_DISPLAY_MS", defaults.badge_display_ms)?,
            rust_log: env::var("RUST_LOG").unwrap_or(defaults.rust_log),
        };

        if config.api_base_url.trim().is_empty() {
            return Err(anyhow::anyhow!("SHELFDESK_API_URL must not be empty"));
        }

        Ok(config)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{name} is not valid: {e}")),
        Err(_) => Ok(default),
    }
}
