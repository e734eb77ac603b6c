//! Client configuration.
//!
//! Environment variables are read here and nowhere else, so a missing server
//! URL is reported once at startup instead of on the first request.

use std::time::Duration;

use shared::DEFAULT_IMAGE_BASE;

use crate::{
    error::{Result, ShelfError},
    transport::{HttpTransport, HttpTransportBuilder},
};

pub const API_URL_VAR: &str = "MEDIASHELF_API_URL";
pub const IMAGE_BASE_VAR: &str = "MEDIASHELF_IMAGE_BASE";
pub const TIMEOUT_VAR: &str = "MEDIASHELF_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Server base URL (required)
    pub api_url: String,
    /// Poster/backdrop base URL (default: TMDB image CDN)
    pub image_base: String,
    /// Per-request HTTP timeout; none unless set
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            image_base: DEFAULT_IMAGE_BASE.to_string(),
            timeout: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// `NotConfigured` if `MEDIASHELF_API_URL` is missing or the timeout is
    /// not a whole number of seconds.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = lookup(API_URL_VAR)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ShelfError::NotConfigured(format!("missing {API_URL_VAR}")))?;

        let image_base = lookup(IMAGE_BASE_VAR)
            .map(|base| base.trim().trim_end_matches('/').to_string())
            .filter(|base| !base.is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_BASE.to_string());

        let timeout = match lookup(TIMEOUT_VAR) {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    ShelfError::NotConfigured(format!("{TIMEOUT_VAR} must be seconds, got {raw:?}"))
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            api_url,
            image_base,
            timeout,
        })
    }

    /// Replaces the server URL, e.g. from a command-line flag.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn transport(&self) -> Result<HttpTransport> {
        let mut builder = HttpTransportBuilder::new().base_url(&self.api_url);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }
}
