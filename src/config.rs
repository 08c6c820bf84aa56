use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{SyncError, SyncResult};

pub const DEFAULT_APP_ID: &str = "default-sensei-hub";
pub const DEFAULT_GENAI_MODEL: &str = "gemini-2.5-flash-preview-09-2025";
const DEFAULT_LOG_FILE: &str = "sensei_hub.log";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Raw store configuration blob; may be absent or malformed.
    pub store_config: Option<String>,
    pub auth_token: Option<String>,
    pub app_id: String,
    pub poll_interval: Duration,
    pub genai_api_key: Option<String>,
    pub genai_model: String,
    pub log_file: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let poll_secs = env::var("STORE_POLL_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(5)
            .max(1);
        Self {
            store_config: opt_env("SENSEI_FIREBASE_CONFIG"),
            auth_token: opt_env("SENSEI_AUTH_TOKEN"),
            app_id: opt_env("SENSEI_APP_ID").unwrap_or_else(|| DEFAULT_APP_ID.to_string()),
            poll_interval: Duration::from_secs(poll_secs),
            genai_api_key: opt_env("GEMINI_API_KEY"),
            genai_model: opt_env("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GENAI_MODEL.to_string()),
            log_file: opt_env("SENSEI_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }

    /// Config with no store: resolves to demo mode.
    pub fn offline() -> Self {
        Self {
            store_config: None,
            auth_token: None,
            app_id: DEFAULT_APP_ID.to_string(),
            poll_interval: Duration::from_secs(5),
            genai_api_key: None,
            genai_model: DEFAULT_GENAI_MODEL.to_string(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

/// Web-app style store configuration (`apiKey`, `projectId`, ...).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub auth_domain: Option<String>,
    #[serde(default)]
    pub database_id: Option<String>,
}

impl StoreConfig {
    /// Absent, unparseable, or missing `apiKey` is a configuration error.
    pub fn parse(raw: Option<&str>) -> SyncResult<Self> {
        let raw = raw
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SyncError::Configuration("store config not provided".to_string()))?;
        let config: StoreConfig = serde_json::from_str(raw)
            .map_err(|err| SyncError::Configuration(format!("store config unparseable: {err}")))?;
        if config.api_key.trim().is_empty() {
            return Err(SyncError::Configuration(
                "store config missing apiKey".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn database(&self) -> &str {
        self.database_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or("(default)")
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
