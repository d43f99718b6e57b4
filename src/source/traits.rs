use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Failure yielded by an artifact fetch.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FetchError {
    /// HTTP status, when the failure was a status rejection.
    pub status: Option<u16>,
    pub message: String,
}

impl FetchError {
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Retrieve the artifact at `url` and execute it. Any side effects of
    /// execution, unit registration in particular, must be complete when
    /// the returned future resolves. Yields the raw payload.
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}
