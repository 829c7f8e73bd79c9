//! Network fetch capability
//!
//! The engine issues exactly one fetch per playlist or segment, with no
//! retry; retry policy belongs to the fetcher implementation if anyone
//! wants one.

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Asynchronous byte fetch for playlists and segments
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Bytes>;
}

/// HTTP fetcher backed by a shared reqwest client
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Bytes> {
        let response = self.client.get(url.clone()).send().await?;
        let response = response.error_for_status()?;
        Ok(response.bytes().await?)
    }
}

/// In-memory fetcher for tests and offline runs.
///
/// Unknown locators fail the same way a dead link would.
#[derive(Default)]
pub struct MapFetcher {
    entries: HashMap<String, Bytes>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: &str, payload: impl Into<Bytes>) {
        self.entries.insert(url.to_string(), payload.into());
    }

    pub fn with(mut self, url: &str, payload: impl Into<Bytes>) -> Self {
        self.insert(url, payload);
        self
    }
}

#[async_trait]
impl MediaFetcher for MapFetcher {
    async fn fetch(&self, url: &Url) -> Result<Bytes> {
        self.entries
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| Error::SegmentFetch {
                url: url.to_string(),
                message: "no such entry".into(),
            })
    }
}
