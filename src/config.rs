//! Configuration loader and application settings.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::errors::{AppError, Result};

/// Bitget public WebSocket endpoint (v2).
pub const DEFAULT_WS_URL: &str = "wss://ws.bitget.com/v2/ws/public";
const DEFAULT_CONFIG_PATH: &str = "config.json";
/// Upper bound for every configured period, in seconds (one day).
pub const MAX_PERIOD_SECS: u64 = 24 * 60 * 60;

/// Optional HTTP proxy used for the WebSocket handshake.
///
/// Disabled by default; set `enabled` and `address` to route through one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub enabled: bool,
    /// e.g. `http://127.0.0.1:7897`
    pub address: String,
}

/// Consolidated application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub proxy: ProxyConfig,
    /// Streaming endpoint of the exchange.
    pub ws_url: String,
    /// Period of the keep-alive ping.
    pub heartbeat_interval_secs: u64,
    /// First reconnect delay; the cap is 30 times this value.
    pub initial_backoff_secs: u64,
    /// Upper bound for TCP + proxy + TLS + WebSocket handshake.
    pub connect_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            proxy: ProxyConfig::default(),
            ws_url: DEFAULT_WS_URL.to_string(),
            heartbeat_interval_secs: 30,
            initial_backoff_secs: 1,
            connect_timeout_secs: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from the JSON file and environment variables.
    ///
    /// The file path comes from `PRICE_FEED_CONFIG` (default `config.json`).
    /// A missing or unparseable file falls back to defaults.
    /// `PRICE_FEED_WS_URL` overrides the endpoint.
    pub fn load() -> Self {
        let path =
            std::env::var("PRICE_FEED_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = match Self::from_file(Path::new(&path)) {
            Ok(Some(config)) => {
                info!(%path, "[INIT] loaded config file");
                config
            }
            Ok(None) => {
                info!(%path, "[INIT] no config file, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(%path, error = %e, "[INIT] config file invalid, using defaults");
                Self::default()
            }
        };
        if let Ok(url) = std::env::var("PRICE_FEED_WS_URL") {
            config.ws_url = url;
        }
        config
    }

    /// Returns `Ok(None)` when the file does not exist.
    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(Some(Self::from_json_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn ws_url(&self) -> Result<Url> {
        Url::parse(&self.ws_url)
            .map_err(|e| AppError::Config(format!("invalid ws_url {:?}: {e}", self.ws_url)))
    }

    // Periods are clamped to 1 s ..= MAX_PERIOD_SECS.
    pub fn heartbeat_interval(&self) -> Duration {
        clamped_secs(self.heartbeat_interval_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        clamped_secs(self.initial_backoff_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        clamped_secs(self.connect_timeout_secs)
    }

    /// Pick the proxy for the handshake from config and the process environment.
    pub fn resolve_proxy(&self) -> Option<Url> {
        self.resolve_proxy_with(|key| std::env::var(key).ok())
    }

    /// Proxy precedence, first usable entry wins: `HTTP_PROXY`, then
    /// `HTTPS_PROXY`, then the config file address when enabled. Unparseable
    /// addresses are logged and skipped.
    pub fn resolve_proxy_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<Url> {
        for key in ["HTTP_PROXY", "HTTPS_PROXY"] {
            let Some(value) = env(key).filter(|v| !v.is_empty()) else {
                continue;
            };
            match Url::parse(&value) {
                Ok(url) => {
                    info!(proxy = %url, source = key, "[PROXY] using environment proxy");
                    return Some(url);
                }
                Err(e) => warn!(source = key, error = %e, "[PROXY] environment proxy unparseable, ignoring"),
            }
        }
        if self.proxy.enabled && !self.proxy.address.is_empty() {
            match Url::parse(&self.proxy.address) {
                Ok(url) => {
                    info!(proxy = %url, "[PROXY] using configured proxy");
                    return Some(url);
                }
                Err(e) => {
                    warn!(address = %self.proxy.address, error = %e, "[PROXY] configured proxy unparseable, ignoring");
                }
            }
        }
        info!("[PROXY] no proxy configured, connecting directly");
        None
    }
}

fn clamped_secs(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(1, MAX_PERIOD_SECS))
}
