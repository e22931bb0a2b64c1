//! Configuration management

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::sync::poller::PollerConfig;

const DEFAULT_API_URL: &str = "http://localhost:8001";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the appliance API
    pub api_url: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub token: Option<String>,

    /// Host that loopback link URLs are rewritten to (defaults to this
    /// machine's hostname)
    #[serde(default)]
    pub page_host: Option<String>,

    pub request_timeout_secs: u64,

    pub history_capacity: usize,

    pub views: ViewsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewsConfig {
    pub overview: ViewConfig,
    pub system: ViewConfig,
    pub containers: ViewConfig,
    pub modem: ViewConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ViewConfig {
    pub refresh_secs: u64,
    pub min_commit_ms: u64,
}

impl ViewConfig {
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig::new(
            Duration::from_secs(self.refresh_secs),
            Duration::from_millis(self.min_commit_ms),
        )
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configured page host, else the machine hostname
    pub fn page_host(&self) -> String {
        self.page_host
            .clone()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| gethostname::gethostname().to_string_lossy().into_owned())
    }
}

/// (view, refresh seconds) defaults
const VIEW_DEFAULTS: &[(&str, i64)] = &[
    ("overview", 2),
    ("system", 8),
    ("containers", 5),
    ("modem", 7),
];

const DEFAULT_MIN_COMMIT_MS: i64 = 900;

/// Get config directory (XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PIDASH_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library/Application Support/pidash");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("pidash");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config/pidash");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("pidash");
        }
    }

    // Fallback to current directory
    PathBuf::from(".")
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let mut builder = ::config::Config::builder()
        .set_default("api_url", DEFAULT_API_URL)?
        .set_default("request_timeout_secs", 10)?
        .set_default("history_capacity", 450)?;

    for (view, refresh_secs) in VIEW_DEFAULTS {
        builder = builder
            .set_default(format!("views.{}.refresh_secs", view), *refresh_secs)?
            .set_default(format!("views.{}.min_commit_ms", view), DEFAULT_MIN_COMMIT_MS)?;
    }

    builder = builder
        // Load from config file if it exists (config.toml, config.json, ...)
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // Override with environment variables (PIDASH_API_URL, PIDASH_VIEWS__MODEM__REFRESH_SECS, ...)
        .add_source(
            ::config::Environment::with_prefix("PIDASH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    // API URL precedence: PIDASH_API_URL > API_URL > config file > default
    if let Ok(url) = std::env::var("PIDASH_API_URL") {
        builder = builder.set_override("api_url", url)?;
    } else if let Ok(url) = std::env::var("API_URL") {
        builder = builder.set_override("api_url", url)?;
    }

    // Keep tokens as strings even when they look numeric
    if let Ok(token) = std::env::var("PIDASH_TOKEN") {
        builder = builder.set_override("token", token)?;
    }

    let config = builder.build()?;

    Ok(config.try_deserialize()?)
}
