//! Client for the cloud-phone vendor API.
//!
//! The Instagram account is created on a rented ARM cloud phone with a
//! unique device fingerprint behind a mobile proxy. The vendor exposes
//! device lifecycle and on-device automation tasks over REST; this client
//! wraps the handful of calls the signup flow needs.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const INSTAGRAM_PACKAGE: &str = "com.instagram.android";

const DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum CloudPhoneError {
    #[error("HTTP request to cloud-phone API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cloud-phone API error: {0}")]
    Api(String),

    #[error("device {0} did not come online in time")]
    DeviceNotReady(String),

    #[error("username already taken: {0}")]
    UsernameTaken(String),
}

/// Account created by the on-device signup task.
#[derive(Debug, Clone, Deserialize)]
pub struct InstagramAccount {
    pub username: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Cloud-phone device lifecycle and on-device signup automation.
#[async_trait]
pub trait CloudPhoneAutomation: Send + Sync {
    /// Create and launch a device behind `proxy_url`. Returns the device id.
    async fn launch_device(&self, name: &str, proxy_url: &str) -> Result<String, CloudPhoneError>;

    /// Poll until the device reports running, up to `timeout`.
    async fn wait_until_ready(
        &self,
        device_id: &str,
        timeout: Duration,
    ) -> Result<(), CloudPhoneError>;

    async fn install_app(&self, device_id: &str, package: &str) -> Result<(), CloudPhoneError>;

    /// Start the signup automation with the rented phone number. Returns a
    /// task id the verification code is submitted against.
    async fn begin_signup(
        &self,
        device_id: &str,
        username: &str,
        phone: &str,
    ) -> Result<String, CloudPhoneError>;

    /// Feed the OTP into the waiting signup task and collect the account.
    async fn submit_verification_code(
        &self,
        task_id: &str,
        code: &str,
    ) -> Result<InstagramAccount, CloudPhoneError>;

    /// Fire-and-forget warmup automation template on the device.
    async fn trigger_warmup(
        &self,
        device_id: &str,
        template_id: &str,
    ) -> Result<(), CloudPhoneError>;
}

#[derive(Deserialize)]
struct DeviceInfo {
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct LaunchResponse {
    device_id: String,
}

#[derive(Deserialize)]
struct TaskResponse {
    task_id: String,
}

pub struct CloudPhoneClient {
    http: Client,
    base_url: String,
    api_token: String,
    android_version: String,
}

impl CloudPhoneClient {
    pub fn new(base_url: &str, api_token: &str) -> Result<Self, CloudPhoneError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            android_version: "Android12".to_string(),
        })
    }

    async fn post(
        &self,
        path: &str,
        payload: serde_json::Value,
    ) -> Result<reqwest::Response, CloudPhoneError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_token)
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(CloudPhoneError::Api(format!("HTTP {status}: {detail}")));
        }
        Ok(response)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, CloudPhoneError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CloudPhoneError::Api(format!("HTTP {}", response.status())));
        }
        Ok(response)
    }
}

#[async_trait]
impl CloudPhoneAutomation for CloudPhoneClient {
    async fn launch_device(&self, name: &str, proxy_url: &str) -> Result<String, CloudPhoneError> {
        let launched: LaunchResponse = self
            .post(
                "/devices/launch",
                json!({
                    "name": name,
                    "os": self.android_version,
                    "proxy": proxy_url,
                }),
            )
            .await?
            .json()
            .await?;
        Ok(launched.device_id)
    }

    async fn wait_until_ready(
        &self,
        device_id: &str,
        timeout: Duration,
    ) -> Result<(), CloudPhoneError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            tokio::time::sleep(DEVICE_POLL_INTERVAL).await;
            if tokio::time::Instant::now() >= deadline {
                return Err(CloudPhoneError::DeviceNotReady(device_id.to_string()));
            }
            match self.get(&format!("/devices/{device_id}")).await {
                Ok(response) => {
                    let info: DeviceInfo = response.json().await?;
                    tracing::debug!(device_id, status = %info.status, "device status");
                    if matches!(info.status.as_str(), "running" | "online" | "active") {
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::warn!(device_id, error = %e, "device status poll failed");
                }
            }
        }
    }

    async fn install_app(&self, device_id: &str, package: &str) -> Result<(), CloudPhoneError> {
        self.post(
            &format!("/devices/{device_id}/install"),
            json!({ "package": package }),
        )
        .await?;
        Ok(())
    }

    async fn begin_signup(
        &self,
        device_id: &str,
        username: &str,
        phone: &str,
    ) -> Result<String, CloudPhoneError> {
        let task: TaskResponse = self
            .post(
                "/tasks",
                json!({
                    "device_id": device_id,
                    "template_id": "instagram-phone-signup",
                    "params": { "username": username, "phone": phone },
                }),
            )
            .await?
            .json()
            .await?;
        Ok(task.task_id)
    }

    async fn submit_verification_code(
        &self,
        task_id: &str,
        code: &str,
    ) -> Result<InstagramAccount, CloudPhoneError> {
        let response = self
            .post(&format!("/tasks/{task_id}/input"), json!({ "code": code }))
            .await;
        match response {
            Ok(response) => Ok(response.json().await?),
            Err(CloudPhoneError::Api(detail)) if detail.contains("username_taken") => {
                Err(CloudPhoneError::UsernameTaken(detail))
            }
            Err(e) => Err(e),
        }
    }

    async fn trigger_warmup(
        &self,
        device_id: &str,
        template_id: &str,
    ) -> Result<(), CloudPhoneError> {
        self.post(
            "/tasks",
            json!({ "device_id": device_id, "template_id": template_id }),
        )
        .await?;
        Ok(())
    }
}
