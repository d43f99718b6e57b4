use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::Client;
use tracing::{debug, warn};

use super::traits::{ArtifactSource, FetchError};

/// Hook run with (url, payload) after a successful retrieval. This is where
/// the embedder evaluates the artifact; registration side effects happen in
/// here, before the fetch future resolves.
pub type ExecutorFn = Arc<dyn Fn(&str, &Bytes) -> anyhow::Result<()> + Send + Sync>;

pub struct HttpArtifactSource {
    client: Client,
    headers: RwLock<HashMap<String, String>>,
    executor: Option<ExecutorFn>,
}

impl HttpArtifactSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            headers: RwLock::new(HashMap::new()),
            executor: None,
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = RwLock::new(headers);
        self
    }

    /// Install the execution hook applied to every retrieved payload.
    pub fn with_executor(mut self, executor: ExecutorFn) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Replace the custom headers (e.g. after a token refresh).
    pub fn update_headers(&self, new_headers: HashMap<String, String>) {
        if !new_headers.is_empty() {
            *self.headers.write() = new_headers;
        }
    }
}

impl Default for HttpArtifactSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let headers = self.headers.read().clone();

        let mut req = self.client.get(url);
        for (k, v) in &headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| FetchError::transport(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            warn!("http fetch failed status={} url={}", status.as_u16(), url);
            return Err(FetchError::status(
                status.as_u16(),
                format!("fetch failed: HTTP {}", status.as_u16()),
            ));
        }

        let payload = resp
            .bytes()
            .await
            .map_err(|e| FetchError::transport(format!("body read failed: {}", e)))?;

        debug!("http fetch ok url={} bytes={}", url, payload.len());

        if let Some(executor) = &self.executor {
            executor(url, &payload)
                .map_err(|e| FetchError::transport(format!("execute failed: {}", e)))?;
        }

        Ok(payload)
    }
}
