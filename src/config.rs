use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Telegram bot credentials; both are required before the daemon starts.
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_target_lang")]
    pub target_lang: String,

    #[serde(default = "default_check_interval")]
    pub check_interval_minutes: u64,

    // Per-call timeouts
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_test_timeout")]
    pub connect_test_timeout_secs: u64,
    #[serde(default = "default_translation_timeout")]
    pub translation_timeout_secs: u64,
    #[serde(default = "default_telegram_timeout")]
    pub telegram_timeout_secs: u64,

    // Retry / pacing
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_message_max_retries")]
    pub message_max_retries: u32,
    #[serde(default = "default_message_send_interval")]
    pub message_send_interval_ms: u64,
    #[serde(default = "default_message_retry_interval")]
    pub message_retry_interval_ms: u64,
    #[serde(default = "default_bulk_message_interval")]
    pub bulk_message_interval_ms: u64,
    #[serde(default = "default_request_interval")]
    pub request_interval_ms: u64,

    // Enrichment switches and limits
    #[serde(default = "default_true")]
    pub enable_translation: bool,
    #[serde(default = "default_true")]
    pub enable_content_summary: bool,
    #[serde(default = "default_max_translation_chars")]
    pub max_translation_chars: usize,
    #[serde(default = "default_max_summary_chars")]
    pub max_summary_chars: usize,

    #[serde(default = "default_lock_path")]
    pub lock_path: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn data_dir() -> PathBuf {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hn-courier");
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn default_db_path() -> String {
    data_dir().join("items.db").to_string_lossy().to_string()
}

fn default_base_url() -> String {
    "https://news.ycombinator.com".to_string()
}

fn default_target_lang() -> String {
    "zh".to_string()
}

fn default_check_interval() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    15
}

fn default_connect_test_timeout() -> u64 {
    10
}

fn default_translation_timeout() -> u64 {
    10
}

fn default_telegram_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

fn default_message_max_retries() -> u32 {
    2
}

fn default_message_send_interval() -> u64 {
    1000
}

fn default_message_retry_interval() -> u64 {
    2000
}

fn default_bulk_message_interval() -> u64 {
    3000
}

fn default_request_interval() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_max_translation_chars() -> usize {
    400
}

fn default_max_summary_chars() -> usize {
    180
}

fn default_lock_path() -> String {
    data_dir()
        .join("hn-courier.lock")
        .to_string_lossy()
        .to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

impl Default for Config {
    fn default() -> Self {
        // serde defaults and Default must agree; an empty TOML table is the
        // same thing as Config::default()
        toml::from_str("").expect("empty config must deserialize")
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hn-courier")
            .join("config.toml")
    }

    /// Bot credentials are the only settings without a usable default.
    pub fn telegram_credentials(&self) -> Result<(String, String)> {
        let token = self
            .bot_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Config("bot_token is not set".to_string()))?;
        let chat_id = self
            .chat_id
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::Config("chat_id is not set".to_string()))?;
        Ok((token, chat_id))
    }
}
