use anyhow::{Context as _, Result};
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com";
pub const DEFAULT_LOCATION: &str = "US";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// `host:port` of a local emulator; implies plain http.
pub const ENV_EMULATOR_HOST: &str = "BIGQUERY_EMULATOR_HOST";
pub const ENV_ENDPOINT: &str = "BIGQUERY_ENDPOINT";
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Settings for the shared warehouse client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `None` means the public API at [`DEFAULT_ENDPOINT`].
    pub endpoint: Option<Url>,
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            access_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Resolve from the ambient environment. `BIGQUERY_ENDPOINT` wins over
    /// `BIGQUERY_EMULATOR_HOST`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(host) = lookup(ENV_EMULATOR_HOST).filter(|v| !v.is_empty()) {
            config = config.with_endpoint(&format!("http://{host}"))?;
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.is_empty()) {
            config = config.with_endpoint(&endpoint)?;
        }
        config.access_token = lookup(ENV_ACCESS_TOKEN).filter(|v| !v.is_empty());
        Ok(config)
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        let url =
            Url::parse(endpoint).with_context(|| format!("Invalid endpoint url: {endpoint}"))?;
        self.endpoint = Some(url);
        Ok(self)
    }

    pub fn endpoint_url(&self) -> Result<Url, url::ParseError> {
        match &self.endpoint {
            Some(url) => Ok(url.clone()),
            None => Url::parse(DEFAULT_ENDPOINT),
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
