//! TOML configuration.
//!
//! Only `[store]` and `[server].bind` are required; every other section
//! falls back to the defaults the service has always shipped with.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a writer waits for the database lock before failing.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

/// Completion-API settings. Model, temperature and token limit are fixed per
/// deployment; requests never override them.
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Environment variable holding the bearer credential.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_model() -> String {
    "llama-3.1-70b-versatile".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

impl GatewayConfig {
    /// Reads the credential from the configured environment variable.
    /// An empty value counts as unset.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetentionConfig {
    #[serde(default = "default_content_ttl_days")]
    pub content_ttl_days: u64,
    #[serde(default = "default_analysis_ttl_days")]
    pub analysis_ttl_days: u64,
    #[serde(default = "default_saved_ttl_days")]
    pub saved_ttl_days: u64,
    #[serde(default = "default_saved_list_capacity")]
    pub saved_list_capacity: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            content_ttl_days: default_content_ttl_days(),
            analysis_ttl_days: default_analysis_ttl_days(),
            saved_ttl_days: default_saved_ttl_days(),
            saved_list_capacity: default_saved_list_capacity(),
        }
    }
}

fn default_content_ttl_days() -> u64 {
    7
}
fn default_analysis_ttl_days() -> u64 {
    30
}
fn default_saved_ttl_days() -> u64 {
    90
}
fn default_saved_list_capacity() -> usize {
    100
}

const SECS_PER_DAY: u64 = 24 * 3600;

/// Upper bound for every TTL setting (100 years).
pub const MAX_TTL_DAYS: u64 = 36_500;

fn days(n: u64) -> std::time::Duration {
    std::time::Duration::from_secs(n.saturating_mul(SECS_PER_DAY))
}

impl RetentionConfig {
    pub fn content_ttl(&self) -> std::time::Duration {
        days(self.content_ttl_days)
    }

    pub fn analysis_ttl(&self) -> std::time::Duration {
        days(self.analysis_ttl_days)
    }

    pub fn saved_ttl(&self) -> std::time::Duration {
        days(self.saved_ttl_days)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Character cap on text extracted from a fetched web page.
    #[serde(default = "default_web_max_chars")]
    pub web_max_chars: usize,
    /// Character cap on the combined content sent with each analysis prompt.
    #[serde(default = "default_prompt_max_chars")]
    pub prompt_max_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            web_max_chars: default_web_max_chars(),
            prompt_max_chars: default_prompt_max_chars(),
        }
    }
}

fn default_web_max_chars() -> usize {
    5000
}
fn default_prompt_max_chars() -> usize {
    4000
}

impl Config {
    /// All-defaults configuration with a store under `./data`.
    pub fn minimal() -> Self {
        Self {
            store: StoreConfig {
                path: PathBuf::from("./data/insight.sqlite"),
                max_connections: default_max_connections(),
                busy_timeout_secs: default_busy_timeout_secs(),
            },
            server: ServerConfig {
                bind: "127.0.0.1:5173".to_string(),
                max_upload_bytes: default_max_upload_bytes(),
            },
            gateway: GatewayConfig::default(),
            retention: RetentionConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let r = &config.retention;
    if r.content_ttl_days == 0 || r.analysis_ttl_days == 0 || r.saved_ttl_days == 0 {
        anyhow::bail!("retention TTLs must be > 0 days");
    }
    if r.content_ttl_days > MAX_TTL_DAYS
        || r.analysis_ttl_days > MAX_TTL_DAYS
        || r.saved_ttl_days > MAX_TTL_DAYS
    {
        anyhow::bail!("retention TTLs must be <= {} days", MAX_TTL_DAYS);
    }
    if r.saved_list_capacity == 0 {
        anyhow::bail!("retention.saved_list_capacity must be > 0");
    }

    if config.store.max_connections == 0 {
        anyhow::bail!("store.max_connections must be > 0");
    }

    if !(0.0..=2.0).contains(&config.gateway.temperature) {
        anyhow::bail!("gateway.temperature must be in [0.0, 2.0]");
    }
    if config.gateway.max_tokens == 0 {
        anyhow::bail!("gateway.max_tokens must be > 0");
    }

    if config.extraction.web_max_chars == 0 || config.extraction.prompt_max_chars == 0 {
        anyhow::bail!("extraction limits must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_sections_fill_in_defaults() {
        let config: Config = toml::from_str(
            r#"
[store]
path = "/tmp/insight.sqlite"

[server]
bind = "127.0.0.1:0"
"#,
        )
        .unwrap();
        validate(&config).unwrap();

        assert_eq!(config.store.max_connections, 5);
        assert_eq!(config.store.busy_timeout_secs, 10);
        assert_eq!(config.gateway.model, "llama-3.1-70b-versatile");
        assert_eq!(config.gateway.max_tokens, 2000);
        assert_eq!(config.retention.content_ttl_days, 7);
        assert_eq!(config.retention.analysis_ttl_days, 30);
        assert_eq!(config.retention.saved_ttl_days, 90);
        assert_eq!(config.retention.saved_list_capacity, 100);
        assert_eq!(config.extraction.web_max_chars, 5000);
        assert_eq!(config.extraction.prompt_max_chars, 4000);
        assert_eq!(
            config.retention.saved_ttl(),
            std::time::Duration::from_secs(90 * 24 * 3600)
        );
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = Config::minimal();
        config.retention.saved_list_capacity = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("saved_list_capacity"));
    }

    #[test]
    fn oversized_ttl_is_rejected_before_use() {
        let config: Config = toml::from_str(
            r#"
[store]
path = "/tmp/insight.sqlite"

[server]
bind = "127.0.0.1:0"

[retention]
saved_ttl_days = 300000000000000
"#,
        )
        .unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("retention TTLs must be <="));

        // Even unvalidated, the conversion saturates instead of overflowing
        let ttl = config.retention.saved_ttl();
        assert_eq!(ttl, std::time::Duration::from_secs(u64::MAX));
    }

    #[test]
    fn ttl_at_the_limit_is_accepted() {
        let mut config = Config::minimal();
        config.retention.content_ttl_days = MAX_TTL_DAYS;
        validate(&config).unwrap();
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let mut config = Config::minimal();
        config.gateway.temperature = 3.5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/insight.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
