use anyhow::{ensure, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_SYMBOL: &str = "AAPL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub http: Option<String>,
    pub https: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YahooConfig {
    #[serde(default = "default_yahoo_base_url")]
    pub base_url: String,
    #[serde(default = "default_yahoo_cookie_url")]
    pub cookie_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: default_yahoo_base_url(),
            cookie_url: default_yahoo_cookie_url(),
            user_agent: default_user_agent(),
            proxy: ProxyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub yahoo: YahooConfig,
    /// Symbol advertised by the server's resource listing.
    #[serde(default = "default_symbol")]
    pub default_symbol: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            yahoo: YahooConfig::default(),
            default_symbol: default_symbol(),
            log_dir: default_log_dir(),
        }
    }
}

impl AppConfig {
    /// Build configuration from well-known environment variables.
    pub fn load_from_env() -> Result<Self> {
        preload_env_files();
        let config = Self::from_lookup(|key| env_var_non_empty(key).ok())?;
        debug!(
            base_url = %config.yahoo.base_url,
            default_symbol = %config.default_symbol,
            "loaded configuration"
        );
        Ok(config)
    }

    /// Build configuration from an arbitrary key lookup. Missing keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let yahoo = YahooConfig {
            base_url: lookup("YAHOO_BASE_URL")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(default_yahoo_base_url),
            cookie_url: lookup("YAHOO_COOKIE_URL").unwrap_or_else(default_yahoo_cookie_url),
            user_agent: lookup("YAHOO_USER_AGENT").unwrap_or_else(default_user_agent),
            proxy: ProxyConfig {
                http: lookup("YAHOO_HTTP_PROXY"),
                https: lookup("YAHOO_HTTPS_PROXY"),
            },
        };

        let default_symbol = lookup("FINANCE_DEFAULT_SYMBOL")
            .map(|value| value.trim().to_uppercase())
            .unwrap_or_else(default_symbol);

        ensure!(
            !default_symbol.contains('/'),
            "FINANCE_DEFAULT_SYMBOL must not contain '/': {default_symbol}"
        );

        let log_dir = lookup("FINANCE_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_log_dir);

        Ok(Self {
            yahoo,
            default_symbol,
            log_dir,
        })
    }
}

fn env_var_non_empty(key: &str) -> Result<String, env::VarError> {
    let value = env::var(key)?;
    if value.trim().is_empty() {
        return Err(env::VarError::NotPresent);
    }
    Ok(value)
}

fn default_yahoo_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_yahoo_cookie_url() -> String {
    "https://fc.yahoo.com".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

fn default_symbol() -> String {
    DEFAULT_SYMBOL.to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn preload_env_files() {
    // 当前目录优先，其次是 workspace 根目录
    let _ = dotenv();

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace_env = manifest_dir.join("../../.env");
    if workspace_env.exists() {
        let _ = dotenvy::from_path(workspace_env);
    }
}
