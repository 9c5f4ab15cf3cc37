use std::time::Duration;

use url::Url;

use crate::error::ValidationError;

/// Target of every session in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: Url,
    /// Label under which events are aggregated; the URL path.
    pub name: String,
    pub connect_timeout: Duration,
}

impl Endpoint {
    #[must_use]
    pub fn new(url: Url, connect_timeout: Duration) -> Self {
        let name = url.path().to_owned();
        Self {
            url,
            name,
            connect_timeout,
        }
    }

    /// Joins `host` (e.g. `ws://localhost:4001/`) and `path` (e.g. `/echo`).
    ///
    /// # Errors
    ///
    /// Returns an error when the result is not a valid `ws`/`wss` URL with a
    /// host.
    pub fn from_host(
        host: &str,
        path: &str,
        connect_timeout: Duration,
    ) -> Result<Self, ValidationError> {
        let joined = format!(
            "{}/{}",
            host.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let url = Url::parse(&joined).map_err(|err| ValidationError::InvalidHostUrl {
            url: joined.clone(),
            source: err,
        })?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(ValidationError::UnsupportedScheme {
                    scheme: other.to_owned(),
                });
            }
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ValidationError::HostMissing);
        }
        Ok(Self::new(url, connect_timeout))
    }
}
