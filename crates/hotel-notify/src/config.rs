//! Configuration for the notification subsystem.
//!
//! All values have defaults so a config file only needs to override what differs
//! from a stock deployment (usually just `base_url`).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{NotifyError, Result};
use crate::model::NotificationType;

/// Backoff parameters for automatic reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay in milliseconds.
    pub max_delay_ms: u64,
    /// Automatic reconnects allowed before giving up until a manual reconnect.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            max_attempts: 5,
        }
    }
}

/// What to do with a locally removed notification when the remote delete fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteFailurePolicy {
    /// Leave it removed; the next fetch brings it back if the server still has it.
    #[default]
    KeepRemoved,
    /// Put it back in place and emit a `DeleteFailed` event.
    Restore,
}

/// Notification subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Base URL of the dashboard API, e.g. `https://hotel.example.com/api`.
    pub base_url: Url,
    /// Path appended to `base_url` for the push channel.
    pub ws_path: String,
    /// Query parameter carrying the session token on the push channel.
    pub token_param: String,
    /// Bound on a single channel-open attempt.
    pub connect_timeout_ms: u64,
    /// Timeout for REST calls.
    pub request_timeout_secs: u64,
    /// Fallback poll interval while the push channel is down.
    pub poll_interval_secs: u64,
    pub reconnect: ReconnectConfig,
    /// Notification types that raise a transient alert when pushed.
    pub alert_types: Vec<NotificationType>,
    pub delete_failure: DeleteFailurePolicy,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

fn default_base_url() -> Url {
    // Static literal, always parses.
    Url::parse("http://localhost:8000/api").unwrap_or_else(|_| unreachable!())
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_path: "/ws".to_string(),
            token_param: "token".to_string(),
            connect_timeout_ms: 10_000,
            request_timeout_secs: 30,
            poll_interval_secs: 60,
            reconnect: ReconnectConfig::default(),
            alert_types: vec![
                NotificationType::BookingConfirmation,
                NotificationType::BookingCancelled,
            ],
            delete_failure: DeleteFailurePolicy::default(),
            event_capacity: 256,
        }
    }
}

impl NotifyConfig {
    /// Create a config pointing at `base_url` with everything else defaulted.
    pub fn new(base_url: &str) -> Result<Self> {
        let config = Self {
            base_url: Url::parse(base_url)?,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        match self.base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(NotifyError::config(format!(
                    "base_url must be http or https, got {other}"
                )));
            }
        }
        if self.connect_timeout_ms == 0 {
            return Err(NotifyError::config("connect_timeout_ms must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(NotifyError::config("request_timeout_secs must be > 0"));
        }
        if self.poll_interval_secs == 0 {
            return Err(NotifyError::config("poll_interval_secs must be > 0"));
        }
        if self.reconnect.base_delay_ms == 0 {
            return Err(NotifyError::config("reconnect.base_delay_ms must be > 0"));
        }
        if self.reconnect.base_delay_ms > self.reconnect.max_delay_ms {
            return Err(NotifyError::config(
                "reconnect.base_delay_ms must not exceed reconnect.max_delay_ms",
            ));
        }
        if self.event_capacity == 0 {
            return Err(NotifyError::config("event_capacity must be > 0"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Push channel URL for `token`: `http(s)` becomes `ws(s)`, `ws_path` is appended
    /// and the token is passed as a query parameter.
    pub fn websocket_url(&self, token: &str) -> Result<Url> {
        let mut url = self.join_path(&self.ws_path);
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| NotifyError::config("cannot derive websocket scheme from base_url"))?;
        url.query_pairs_mut().append_pair(&self.token_param, token);
        Ok(url)
    }

    /// REST endpoint URL for the given path segments below `base_url`.
    pub fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| NotifyError::config("base_url cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn join_path(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        let base = url.path().trim_end_matches('/').to_string();
        let suffix = path.trim_start_matches('/');
        url.set_path(&format!("{base}/{suffix}"));
        url
    }
}
