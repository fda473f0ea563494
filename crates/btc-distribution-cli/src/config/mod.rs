//! Configuration loading and resolution.
//!
//! Each setting resolves as: command-line flag, then environment variable,
//! then built-in default.

use std::path::PathBuf;

/// Page carrying the distribution table and the embedded history series.
pub const DEFAULT_URL: &str = "https://bitinfocharts.com/zh/bitcoin-distribution-history.html";

/// Browser identity sent with the request; the site rejects bare clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/131.0.0.0 Safari/537.36";

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BASE_MS: u64 = 500;

pub const ENV_DATA_DIR: &str = "BTC_DIST_DATA_DIR";
pub const ENV_URL: &str = "BTC_DIST_URL";
pub const ENV_TIMEOUT_MS: &str = "BTC_DIST_TIMEOUT_MS";
pub const ENV_RETRIES: &str = "BTC_DIST_RETRIES";

/// Settings for the page fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub url: String,
    pub user_agent: String,
    /// Per-attempt request timeout.
    pub timeout_ms: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry.
    pub retry_base_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_RETRIES,
            retry_base_ms: DEFAULT_RETRY_BASE_MS,
        }
    }
}

impl FetchConfig {
    /// Resolve fetch settings from flags and the environment.
    pub fn resolve(url: Option<String>, timeout_ms: Option<u64>, retries: Option<u32>) -> Self {
        let defaults = Self::default();
        Self {
            url: url
                .or_else(|| read_env_string(ENV_URL))
                .filter(|u| !u.is_empty())
                .unwrap_or(defaults.url),
            timeout_ms: timeout_ms
                .unwrap_or_else(|| read_env_u64(ENV_TIMEOUT_MS, defaults.timeout_ms)),
            max_retries: retries.unwrap_or_else(|| read_env_u32(ENV_RETRIES, defaults.max_retries)),
            ..defaults
        }
    }
}

/// Resolve the directory holding the dataset files.
pub fn resolve_data_dir(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    match read_env_string(ENV_DATA_DIR) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_DATA_DIR),
    }
}

fn read_env_u64(name: &str, default_value: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn read_env_u32(name: &str, default_value: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default_value)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string())
}
