//! Run configuration.
//!
//! Defaults are overlaid by environment variables (after `.env` is loaded)
//! and then by command line flags.

use std::path::PathBuf;

use crate::error::RenameError;

/// Default model for name generation
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com";

/// Public price sheet consulted for live per-token rates
pub const DEFAULT_PRICING_URL: &str =
    "https://raw.githubusercontent.com/BerriAI/litellm/main/model_prices_and_context_window.json";

/// Collision suffix attempts before a file is given up on
pub const DEFAULT_MAX_SUFFIX_ATTEMPTS: u32 = 1000;

#[derive(Debug, Clone)]
pub struct RenameConfig {
    /// Model identifier sent to the generation endpoint and used for pricing
    pub model: String,

    /// Base URL for the chat-completions API
    pub api_base_url: String,

    /// Number of prior renames shown to the model
    pub window_capacity: usize,

    /// Character cap on text excerpts
    pub excerpt_chars: usize,

    /// Pages read from paginated documents
    pub pdf_pages: usize,

    /// `_1`, `_2`, ... suffixes tried before giving up on a file
    pub max_suffix_attempts: u32,

    /// Per-request timeout for generation calls
    pub request_timeout_secs: u64,

    /// Live pricing sheet; ignored when `offline_pricing` is set
    pub pricing_url: String,

    /// Skip the live pricing lookup and use the static table
    pub offline_pricing: bool,

    /// Where removed duplicates are moved
    pub quarantine_dir: PathBuf,

    /// Days a quarantined duplicate is kept before `quarantine purge` removes it
    pub quarantine_retention_days: u32,

    /// Use the OS trash instead of the quarantine directory
    pub use_system_trash: bool,

    /// Append-only rename history; `None` disables logging
    pub log_file: Option<PathBuf>,

    /// Abort before the live pass when the estimate exceeds this (USD)
    pub max_cost_usd: Option<f64>,
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            window_capacity: 5,
            excerpt_chars: 2000,
            pdf_pages: 2,
            max_suffix_attempts: DEFAULT_MAX_SUFFIX_ATTEMPTS,
            request_timeout_secs: 30,
            pricing_url: DEFAULT_PRICING_URL.to_string(),
            offline_pricing: false,
            quarantine_dir: default_quarantine_dir(),
            quarantine_retention_days: 30,
            use_system_trash: false,
            log_file: Some(default_log_file()),
            max_cost_usd: None,
        }
    }
}

impl RenameConfig {
    /// Defaults overlaid with `SENTINEL_RENAME_*` / `OPENAI_BASE_URL` variables
    pub fn from_env() -> Result<Self, RenameError> {
        let mut config = Self::default();

        if let Ok(model) = std::env::var("SENTINEL_RENAME_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            if !url.trim().is_empty() {
                config.api_base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Some(window) = env_parse::<usize>("SENTINEL_RENAME_WINDOW")? {
            config.window_capacity = window;
        }
        if let Some(timeout) = env_parse::<u64>("SENTINEL_RENAME_TIMEOUT_SECS")? {
            config.request_timeout_secs = timeout;
        }
        if let Ok(dir) = std::env::var("SENTINEL_RENAME_QUARANTINE_DIR") {
            config.quarantine_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("SENTINEL_RENAME_LOG_FILE") {
            config.log_file = Some(PathBuf::from(path));
        }
        if std::env::var("SENTINEL_RENAME_OFFLINE_PRICING").is_ok() {
            config.offline_pricing = true;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RenameError> {
        if self.model.trim().is_empty() {
            return Err(RenameError::Config("model must not be empty".to_string()));
        }
        if self.excerpt_chars == 0 {
            return Err(RenameError::Config(
                "excerpt length must be at least one character".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(RenameError::Config(
                "request timeout must be at least one second".to_string(),
            ));
        }
        if let Some(budget) = self.max_cost_usd {
            if !budget.is_finite() || budget < 0.0 {
                return Err(RenameError::Config(format!("invalid cost budget: {}", budget)));
            }
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, RenameError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| RenameError::Config(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(None),
    }
}

/// ~/.sentinel/quarantine
pub fn default_quarantine_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".sentinel")
        .join("quarantine")
}

/// <config dir>/sentinel/rename-history.log
pub fn default_log_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sentinel")
        .join("rename-history.log")
}
