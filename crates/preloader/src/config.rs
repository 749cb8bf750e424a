use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use sniffer::HttpSniffer;

use crate::error::ConfigError;
use crate::overlay::PlaceholderOverlay;

pub const DEFAULT_PLACEHOLDER_CLASS: &str = "preloader-placeholder";
pub const DEFAULT_PLACEHOLDER_TEXT: &str = "Loading...";

/// Preloader settings, usually read from a TOML file.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloaderConfig {
    /// Class marker carried by the placeholder element.
    pub placeholder_class: String,
    /// Text shown inside the placeholder.
    pub placeholder_text: String,
    /// Base for resolving root-relative image sources.
    pub base_url: Option<String>,
    /// Per-request sniff timeout. No timeout when unset.
    pub request_timeout_secs: Option<u64>,
    /// Capacity of the registry's message channel.
    pub channel_capacity: usize,
    /// Capacity of the transition broadcast channel.
    pub event_capacity: usize,
}

impl Default for PreloaderConfig {
    fn default() -> Self {
        Self {
            placeholder_class: DEFAULT_PLACEHOLDER_CLASS.to_string(),
            placeholder_text: DEFAULT_PLACEHOLDER_TEXT.to_string(),
            base_url: None,
            request_timeout_secs: None,
            channel_capacity: 100,
            event_capacity: 256,
        }
    }
}

impl PreloaderConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load the configuration from a TOML file.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                operation: "Failed to read config",
                path: path.display().to_string(),
                source,
            })?;

        let config = Self::from_toml(&content)?;
        tracing::info!("Loaded preloader config from {}", path.display());
        Ok(config)
    }

    pub fn overlay(&self) -> PlaceholderOverlay {
        PlaceholderOverlay::new(&self.placeholder_class, &self.placeholder_text)
    }

    /// Build the HTTP sniffer described by this configuration.
    pub fn build_sniffer(&self) -> Result<HttpSniffer, ConfigError> {
        let mut sniffer = HttpSniffer::new()?;

        if let Some(base) = &self.base_url {
            let url = Url::parse(base).map_err(|e| ConfigError::BaseUrl {
                url: base.clone(),
                reason: e.to_string(),
            })?;
            sniffer = sniffer.with_base_url(url);
        }
        if let Some(secs) = self.request_timeout_secs {
            sniffer = sniffer.with_timeout(Duration::from_secs(secs));
        }

        Ok(sniffer)
    }
}
