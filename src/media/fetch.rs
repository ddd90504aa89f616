//! Remote media fetch backends.
//!
//! The [`MediaFetcher`] trait is the only way the resolver reaches the
//! network. [`HttpFetcher`] is the production implementation (blocking
//! `reqwest`, called from inside the resolver's rayon pool);
//! [`OfflineFetcher`] refuses every request and backs the CLI's `--offline`.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status}")]
    Status { status: u16 },
    #[error("response body is empty")]
    EmptyBody,
    #[error("network access is disabled")]
    Offline,
}

/// Bytes of a fetched remote resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    pub data: Vec<u8>,
    /// `Content-Type` reported by the server, if any.
    pub mime_type: Option<String>,
}

pub trait MediaFetcher: Sync {
    fn fetch(&self, url: &str) -> Result<FetchedMedia, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("scorm-forge/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl MediaFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedMedia, FetchError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = response.bytes()?.to_vec();
        if data.is_empty() {
            return Err(FetchError::EmptyBody);
        }
        tracing::debug!(url, bytes = data.len(), "Fetched remote media");
        Ok(FetchedMedia { data, mime_type })
    }
}

/// Fetcher for builds that must not touch the network.
pub struct OfflineFetcher;

impl MediaFetcher for OfflineFetcher {
    fn fetch(&self, _url: &str) -> Result<FetchedMedia, FetchError> {
        Err(FetchError::Offline)
    }
}
