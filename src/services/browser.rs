//! Client for the browser automation bridge.
//!
//! The bridge is a sidecar that drives an already-logged-in desktop browser
//! over its remote-debugging port (Facebook page creation, YouTube Brand
//! Account creation). Login lifecycle is entirely outside this process: the
//! operator runs the bridge, signs in once, and keeps it running. This
//! client only checks that the session is still live and issues the two
//! creation flows.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which login the bridge's browser needs for a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDomain {
    Facebook,
    Google,
}

impl SessionDomain {
    fn as_str(self) -> &'static str {
        match self {
            SessionDomain::Facebook => "facebook",
            SessionDomain::Google => "google",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FacebookPageRequest {
    pub page_name: String,
    pub username: String,
    pub category_id: u32,
}

#[derive(Debug, Serialize)]
pub struct YoutubeChannelRequest {
    pub channel_name: String,
    pub handle: String,
}

/// Presence created by a bridge flow.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPresence {
    /// Platform-assigned id (page id, channel id), when extractable.
    pub external_id: Option<String>,
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("HTTP request to bridge failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("browser session expired; re-run the login setup")]
    SessionExpired,

    #[error("handle already taken: {0}")]
    HandleTaken(String),

    #[error("bridge returned HTTP {0}: {1}")]
    Unavailable(StatusCode, String),
}

/// Drives creation flows in the bridge's authenticated browser.
#[async_trait]
pub trait BrowserAutomation: Send + Sync {
    /// Whether the browser still holds a valid login for `domain`.
    async fn session_ready(&self, domain: SessionDomain) -> Result<bool, BridgeError>;

    async fn create_facebook_page(
        &self,
        request: &FacebookPageRequest,
    ) -> Result<CreatedPresence, BridgeError>;

    async fn create_youtube_channel(
        &self,
        request: &YoutubeChannelRequest,
    ) -> Result<CreatedPresence, BridgeError>;
}

#[derive(Deserialize)]
struct SessionStatus {
    authenticated: bool,
}

pub struct BrowserBridgeClient {
    http: Client,
    base_url: String,
}

impl BrowserBridgeClient {
    pub fn new(base_url: &str) -> Result<Self, BridgeError> {
        let http = Client::builder()
            // Creation flows walk multi-step UIs; give them room.
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    async fn post_flow<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<CreatedPresence, BridgeError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(response.json().await?),
            StatusCode::UNAUTHORIZED => Err(BridgeError::SessionExpired),
            StatusCode::CONFLICT => {
                let detail = response.text().await.unwrap_or_default();
                Err(BridgeError::HandleTaken(detail))
            }
            s => {
                let detail = response.text().await.unwrap_or_default();
                Err(BridgeError::Unavailable(s, detail))
            }
        }
    }
}

#[async_trait]
impl BrowserAutomation for BrowserBridgeClient {
    async fn session_ready(&self, domain: SessionDomain) -> Result<bool, BridgeError> {
        let response = self
            .http
            .get(format!("{}/sessions/{}", self.base_url, domain.as_str()))
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let status: SessionStatus = response.json().await?;
        Ok(status.authenticated)
    }

    async fn create_facebook_page(
        &self,
        request: &FacebookPageRequest,
    ) -> Result<CreatedPresence, BridgeError> {
        self.post_flow("/facebook/pages", request).await
    }

    async fn create_youtube_channel(
        &self,
        request: &YoutubeChannelRequest,
    ) -> Result<CreatedPresence, BridgeError> {
        self.post_flow("/youtube/channels", request).await
    }
}
