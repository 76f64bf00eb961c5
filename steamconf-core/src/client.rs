//! Signed client for the mobile confirmation endpoints.

use crate::auth::{generate_confirmation_key, percent_encode};
use crate::config::ClientConfig;
use crate::confirmation::{Confirmation, ConfirmationList};
use crate::transport::{HttpTransport, Transport};
use crate::{ConfirmationError, Result};
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const MOBILE_CONF: &str = "mobileconf/conf";
const MOBILE_AJAX: &str = "mobileconf/ajaxop";
const LIST_TAG: &str = "conf";

/// Decision sent for a single confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Allow,
    Cancel,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Allow => "allow",
            Operation::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
struct DecisionResponse {
    success: bool,
}

/// Client for one account session.
///
/// Cloning is cheap; clones share the transport and its cookie jar.
#[derive(Clone)]
pub struct ConfirmationClient {
    config: Arc<ClientConfig>,
    base_url: Url,
    transport: Arc<dyn Transport>,
}

impl ConfirmationClient {
    /// Create a client backed by [`HttpTransport`].
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_secs(config.request_timeout_secs))?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client over a caller-provided transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let base_url = config.base_url()?;

        let client = Self {
            config: Arc::new(config),
            base_url,
            transport,
        };
        client.configure_cookies(&client.config.web_cookies[..]);
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Install raw cookies for the base origin. Re-installing a cookie
    /// overwrites the previous value.
    pub fn configure_cookies<S: AsRef<str>>(&self, cookies: &[S]) -> &Self {
        for cookie in cookies {
            self.transport.set_cookie(cookie.as_ref(), &self.base_url);
        }
        self
    }

    /// Fetch the raw confirmation listing document.
    pub async fn fetch_confirmation_document(&self) -> Result<String> {
        let url = self.confirmation_url(chrono::Utc::now().timestamp())?;
        debug!(endpoint = MOBILE_CONF, "fetching confirmation list");
        self.get_body(&url).await
    }

    /// Fetch the listing and build a confirmation list from it.
    pub async fn load_confirmations(&self) -> Result<ConfirmationList> {
        let document = self.fetch_confirmation_document().await?;
        ConfirmationList::from_document(self.clone(), &document)
    }

    /// Send an allow/cancel decision for `confirmation`.
    ///
    /// Returns the service's `success` flag. This does not touch the list the
    /// confirmation belongs to; use [`ConfirmationList::accept`] or
    /// [`ConfirmationList::deny`] to also retire the item.
    pub async fn send_decision(
        &self,
        confirmation: &Confirmation,
        operation: Operation,
    ) -> Result<bool> {
        let url = self.decision_url(
            confirmation.id(),
            &confirmation.key(),
            operation,
            chrono::Utc::now().timestamp(),
        )?;
        debug!(
            endpoint = MOBILE_AJAX,
            id = confirmation.id(),
            %operation,
            "sending confirmation decision"
        );

        let body = self.get_body(&url).await?;
        let response: DecisionResponse = serde_json::from_str(&body).map_err(|e| {
            ConfirmationError::MalformedResponse(format!("invalid decision response: {}", e))
        })?;
        Ok(response.success)
    }

    pub(crate) fn confirmation_url(&self, time: i64) -> Result<String> {
        let query = self.signed_query(LIST_TAG, time)?;
        Ok(format!("{}/{}?{}", self.base(), MOBILE_CONF, query))
    }

    pub(crate) fn decision_url(
        &self,
        id: u64,
        key: &str,
        operation: Operation,
        time: i64,
    ) -> Result<String> {
        let query = self.signed_query(operation.as_str(), time)?;
        Ok(format!(
            "{}/{}?{}&cid={}&ck={}&op={}",
            self.base(),
            MOBILE_AJAX,
            query,
            id,
            percent_encode(key),
            operation
        ))
    }

    fn signed_query(&self, tag: &str, time: i64) -> Result<String> {
        let key = generate_confirmation_key(&self.config.identity_secret, time, tag)?;
        Ok(format!(
            "p={}&a={}&k={}&t={}&m=android&tag={}",
            self.config.device_id, self.config.steam_id, key, time, tag
        ))
    }

    fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    async fn get_body(&self, url: &str) -> Result<String> {
        let resp = self.transport.get(url).await?;

        if resp.status != 200 {
            return Err(ConfirmationError::Transport {
                url: url.to_string(),
                status: Some(resp.status),
                message: format!("unexpected status {}", resp.status),
            });
        }

        match resp.body {
            Some(body) if !body.is_empty() => Ok(body),
            _ => Err(ConfirmationError::EmptyResponse {
                url: url.to_string(),
            }),
        }
    }
}
