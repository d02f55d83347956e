//! RTMP publishing client
//!
//! High-level API for publishing a live stream to an RTMP ingest.

pub mod config;
pub mod session;

pub use config::{ParsedUrl, PublisherConfig, StreamMetadata};
pub use session::{Disconnector, RtmpPublisher, SessionEvent, SessionState};

use async_trait::async_trait;

use crate::error::Result;

/// Credentials for one publishing session
///
/// Produced by the provisioning layer (e.g. over a short-range radio). The
/// core consumes them once and never persists them.
#[derive(Debug, Clone)]
pub struct StreamCredentials {
    pub url: String,
    pub stream_key: String,
}

/// Source of publishing credentials
#[async_trait]
pub trait CredentialSource: Send {
    /// Yield the ingest URL and stream key for the next session
    async fn credentials(&mut self) -> Result<StreamCredentials>;
}

/// Credentials already in hand
pub struct StaticCredentials {
    creds: StreamCredentials,
}

impl StaticCredentials {
    pub fn new(url: impl Into<String>, stream_key: impl Into<String>) -> Self {
        Self {
            creds: StreamCredentials {
                url: url.into(),
                stream_key: stream_key.into(),
            },
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn credentials(&mut self) -> Result<StreamCredentials> {
        Ok(self.creds.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_credentials() {
        let mut source = StaticCredentials::new("rtmp://host/live", "key");
        let creds = source.credentials().await.unwrap();
        assert_eq!(creds.url, "rtmp://host/live");
        assert_eq!(creds.stream_key, "key");
    }
}
