//! Facebook page creation via the browser automation bridge.

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::identity::Identity;
use crate::models::platform::Platform;
use crate::services::browser::{BrowserAutomation, FacebookPageRequest, SessionDomain};
use crate::services::executor::{StepError, StepExecutor, StepSuccess};

/// Facebook page category id for entertainment pages.
const CATEGORY_ENTERTAINMENT: u32 = 2200;

pub struct FacebookExecutor {
    bridge: Arc<dyn BrowserAutomation>,
}

impl FacebookExecutor {
    pub fn new(bridge: Arc<dyn BrowserAutomation>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl StepExecutor for FacebookExecutor {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn execute(&self, identity: &Identity) -> Result<StepSuccess, StepError> {
        if !self.bridge.session_ready(SessionDomain::Facebook).await? {
            return Err(StepError::SessionNotReady(
                "facebook login missing in bridge browser".into(),
            ));
        }

        tracing::info!(page_name = %identity.fb_page_name, "creating facebook page");
        let created = self
            .bridge
            .create_facebook_page(&FacebookPageRequest {
                page_name: identity.fb_page_name.clone(),
                username: identity.fb_username.clone(),
                category_id: CATEGORY_ENTERTAINMENT,
            })
            .await?;

        Ok(StepSuccess {
            handle: identity.fb_username.clone(),
            url: created.url,
            external_id: created.external_id,
        })
    }
}
