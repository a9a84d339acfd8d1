//! Client configuration

use std::time::Duration;

use crate::validate::Limits;

/// Merge service used when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3050";

/// Environment variable overriding the merge service base URL
pub const API_BASE_URL_ENV: &str = "UNIFYPDF_API_BASE_URL";

/// Default timeout for one merge round trip
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Settings for a merge session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the merge service; the endpoint is `<base>/pdf/merge`
    pub api_base_url: String,
    /// Upload limits
    pub limits: Limits,
    /// Timeout for one merge request
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            limits: Limits::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    /// Defaults, with the base URL taken from `UNIFYPDF_API_BASE_URL` if set
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(API_BASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            config.api_base_url = url;
        }
        config
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
