//! Client configuration.

use crate::{ConfirmationError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;
use zeroize::Zeroizing;

pub const DEFAULT_BASE_URL: &str = "https://steamcommunity.com";

/// Account identity and connection settings for a confirmation session.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub steam_id: String,
    /// Base64 identity secret from the authenticator.
    #[serde(with = "zeroizing_string")]
    pub identity_secret: Zeroizing<String>,
    pub device_id: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Raw cookies installed for the base origin when the client is built.
    #[serde(default)]
    pub web_cookies: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl ClientConfig {
    pub fn new(steam_id: &str, identity_secret: &str, device_id: &str) -> Self {
        Self {
            steam_id: steam_id.to_string(),
            identity_secret: Zeroizing::new(identity_secret.to_string()),
            device_id: device_id.to_string(),
            base_url: default_base_url(),
            web_cookies: Vec::new(),
            request_timeout_secs: default_timeout_secs(),
        }
    }

    /// Load a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfirmationError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.steam_id.trim().is_empty() {
            return Err(ConfirmationError::Config("steam_id cannot be empty".to_string()));
        }
        if self.device_id.trim().is_empty() {
            return Err(ConfirmationError::Config("device_id cannot be empty".to_string()));
        }
        if self.identity_secret.trim().is_empty() {
            return Err(ConfirmationError::Config(
                "identity_secret cannot be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfirmationError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        self.base_url()?;
        Ok(())
    }

    /// Parsed base URL with any trailing slash removed from the path.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|e| ConfirmationError::Config(format!("invalid base_url: {}", e)))
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("steam_id", &self.steam_id)
            .field("identity_secret", &"<redacted>")
            .field("device_id", &self.device_id)
            .field("base_url", &self.base_url)
            .field("web_cookies", &self.web_cookies.len())
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

mod zeroizing_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use zeroize::Zeroizing;

    pub fn serialize<S: Serializer>(value: &Zeroizing<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Zeroizing<String>, D::Error> {
        String::deserialize(d).map(Zeroizing::new)
    }
}
