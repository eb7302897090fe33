use std::time::Duration;

use url::Url;

use crate::{ClientError, FailureKind};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8081/";

/// Everything the client needs to know about its environment, passed in at construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub connect_timeout: Duration,
    /// Delay between upload status poll ticks.
    pub poll_interval: Duration,
    /// `None` polls until every job is terminal.
    pub poll_timeout: Option<Duration>,
    pub max_batch_files: usize,
    /// Uploads in flight at once during submission.
    pub submit_concurrency: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(3),
            poll_timeout: None,
            max_batch_files: 10,
            submit_concurrency: 1,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            ..Self::default()
        })
    }

    /// Resolves an endpoint path (`"upload-status"`) against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ClientError::new(FailureKind::Network, err.to_string()))
    }
}

/// Parses a base URL, making sure it ends in `/` so endpoint joins keep any path prefix.
pub fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized)
        .map_err(|err| ClientError::new(FailureKind::Network, format!("invalid base url: {err}")))
}
