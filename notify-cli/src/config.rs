use std::path::{Path, PathBuf};

use hotel_notify::NotifyConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{CliError, Result};

const REDACTED: &str = "<redacted>";

/// CLI configuration: the session token plus the library's [`NotifyConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(flatten)]
    pub notify: NotifyConfig,
}

impl AppConfig {
    /// `<config dir>/hotel-notify/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hotel-notify").join("config.toml"))
    }

    /// Load from `path` (or the default location). A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path(),
        };
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.notify.validate()?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Apply command-line and environment overrides.
    pub fn with_overrides(mut self, base_url: Option<&str>, token: Option<String>) -> Result<Self> {
        if let Some(base_url) = base_url {
            self.notify.base_url = Url::parse(base_url).map_err(hotel_notify::NotifyError::from)?;
            self.notify.validate()?;
        }
        if token.is_some() {
            self.token = token;
        }
        Ok(self)
    }

    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(CliError::MissingToken)
    }

    /// TOML rendering with the token redacted.
    pub fn show(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.token.is_some() {
            shown.token = Some(REDACTED.to_string());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}
