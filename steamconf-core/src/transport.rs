//! HTTP transport with a persistent cookie jar.
//!
//! The client only needs `GET` and cookie installation, so the transport is
//! a small trait. `HttpTransport` is the production implementation; tests
//! supply their own.

use crate::{ConfirmationError, Result};
use async_trait::async_trait;
use reqwest::cookie::Jar;
pub use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Option<String>,
}

/// Minimal HTTP capability used by [`crate::ConfirmationClient`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET request. Transport-level failures map to
    /// [`ConfirmationError::Transport`]; any status is returned as-is.
    async fn get(&self, url: &str) -> Result<TransportResponse>;

    /// Install a raw `Set-Cookie` style string scoped to `origin`.
    fn set_cookie(&self, raw_cookie: &str, origin: &Url);
}

/// `reqwest` transport sharing one cookie jar across requests.
pub struct HttpTransport {
    client: reqwest::Client,
    jar: Arc<Jar>,
}

impl HttpTransport {
    /// Create a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeout)
            .user_agent(format!("steamconf/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfirmationError::Transport {
                url: String::new(),
                status: None,
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, jar })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ConfirmationError::Transport {
                url: url.to_string(),
                status: None,
                message: e.to_string(),
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| ConfirmationError::Transport {
            url: url.to_string(),
            status: Some(status),
            message: format!("failed to read body: {}", e),
        })?;

        Ok(TransportResponse {
            status,
            body: if body.is_empty() { None } else { Some(body) },
        })
    }

    fn set_cookie(&self, raw_cookie: &str, origin: &Url) {
        self.jar.add_cookie_str(raw_cookie, origin);
    }
}
