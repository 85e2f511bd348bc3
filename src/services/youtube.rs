//! YouTube Brand Account channel creation via the browser automation bridge.

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::identity::Identity;
use crate::models::platform::Platform;
use crate::services::browser::{BrowserAutomation, SessionDomain, YoutubeChannelRequest};
use crate::services::executor::{StepError, StepExecutor, StepSuccess};

pub struct YoutubeExecutor {
    bridge: Arc<dyn BrowserAutomation>,
}

impl YoutubeExecutor {
    pub fn new(bridge: Arc<dyn BrowserAutomation>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl StepExecutor for YoutubeExecutor {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn execute(&self, identity: &Identity) -> Result<StepSuccess, StepError> {
        if !self.bridge.session_ready(SessionDomain::Google).await? {
            return Err(StepError::SessionNotReady(
                "google login missing in bridge browser".into(),
            ));
        }

        tracing::info!(channel_name = %identity.yt_channel_name, "creating youtube channel");
        let created = self
            .bridge
            .create_youtube_channel(&YoutubeChannelRequest {
                channel_name: identity.yt_channel_name.clone(),
                handle: identity.yt_handle.clone(),
            })
            .await?;

        Ok(StepSuccess {
            handle: identity.yt_handle.clone(),
            url: created.url,
            external_id: created.external_id,
        })
    }
}
