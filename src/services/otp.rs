//! OTP coordination over a ranked list of disposable-number providers.
//!
//! A step rents a number through [`OtpCoordinator::request_number`], hands
//! the phone to the platform signup flow, then waits for the inbound code
//! with [`OtpCoordinator::await_code`]. Leases are owned by exactly one
//! step; [`OtpCoordinator::release`] settles the rental with the provider
//! (confirm if the code was consumed, cancel otherwise) and is idempotent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tokio::time::Instant;

/// Per-request cap on provider HTTP calls. Providers answer quickly;
/// anything slower is a dead connection.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Coordinator-level failures surfaced to step executors.
#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("no phone number available from any configured provider")]
    NoNumberAvailable,

    #[error("no verification code arrived within the timeout")]
    Timeout,
}

/// Provider-level failures; the coordinator falls through to the next
/// provider on any of these.
#[derive(Debug, thiserror::Error)]
pub enum OtpProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected the request: {0}")]
    Api(String),

    /// The rental reached a terminal provider-side state (canceled,
    /// banned, expired) and will never deliver a code.
    #[error("rental ended on the provider side: {0}")]
    Gone(String),
}

/// A temporary claim on a rented phone number.
#[derive(Debug)]
pub struct NumberLease {
    pub provider: String,
    pub request_id: String,
    pub phone: String,
    pub acquired_at: DateTime<Utc>,
    consumed: bool,
    released: bool,
}

/// One disposable-number vendor.
#[async_trait]
pub trait OtpProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Rent a number for `service` in `country`. Returns (request id, phone).
    async fn request_number(
        &self,
        country: &str,
        service: &str,
    ) -> Result<(String, String), OtpProviderError>;

    /// One poll for the inbound code. `Ok(None)` means keep waiting.
    async fn poll_code(&self, request_id: &str) -> Result<Option<String>, OtpProviderError>;

    /// Report the rental as successfully used.
    async fn confirm(&self, request_id: &str) -> Result<(), OtpProviderError>;

    /// Return the rental unused.
    async fn cancel(&self, request_id: &str) -> Result<(), OtpProviderError>;
}

pub struct OtpCoordinator {
    providers: Vec<Arc<dyn OtpProvider>>,
    poll_interval: Duration,
    max_poll_failures: u32,
}

impl OtpCoordinator {
    pub fn new(
        providers: Vec<Arc<dyn OtpProvider>>,
        poll_interval: Duration,
        max_poll_failures: u32,
    ) -> Self {
        Self { providers, poll_interval, max_poll_failures }
    }

    /// Rent a number, trying providers in priority order. A provider-level
    /// failure (no stock, account exhausted, API error) falls through to
    /// the next provider; only when every provider has failed does the
    /// request fail as a whole.
    pub async fn request_number(
        &self,
        country: &str,
        service: &str,
    ) -> Result<NumberLease, OtpError> {
        for provider in &self.providers {
            match provider.request_number(country, service).await {
                Ok((request_id, phone)) => {
                    tracing::info!(
                        provider = provider.name(),
                        phone = %phone,
                        "rented verification number"
                    );
                    return Ok(NumberLease {
                        provider: provider.name().to_string(),
                        request_id,
                        phone,
                        acquired_at: Utc::now(),
                        consumed: false,
                        released: false,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        "provider could not supply a number, trying next"
                    );
                }
            }
        }
        Err(OtpError::NoNumberAvailable)
    }

    /// Poll for the code until it arrives or `timeout` elapses. The first
    /// poll happens immediately, so even a timeout shorter than the poll
    /// interval gets one look at the inbox. Transient poll failures are
    /// retried silently up to a bounded count, after which the wait is
    /// treated as a hard timeout.
    pub async fn await_code(
        &self,
        lease: &mut NumberLease,
        timeout: Duration,
    ) -> Result<String, OtpError> {
        let provider = match self.provider_for(lease) {
            Some(p) => p,
            None => return Err(OtpError::Timeout),
        };
        let deadline = Instant::now() + timeout;
        let mut consecutive_failures = 0u32;

        loop {
            match provider.poll_code(&lease.request_id).await {
                Ok(Some(code)) => {
                    tracing::info!(provider = provider.name(), "verification code received");
                    lease.consumed = true;
                    return Ok(code);
                }
                Ok(None) => {
                    consecutive_failures = 0;
                }
                Err(OtpProviderError::Gone(reason)) => {
                    tracing::warn!(provider = provider.name(), %reason, "rental ended provider-side");
                    return Err(OtpError::Timeout);
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        consecutive_failures,
                        "poll failed"
                    );
                    if consecutive_failures > self.max_poll_failures {
                        return Err(OtpError::Timeout);
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(OtpError::Timeout);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Settle the rental with the provider. Idempotent: a second call is a
    /// no-op, and settlement errors are logged, not propagated.
    pub async fn release(&self, lease: &mut NumberLease) {
        if lease.released {
            return;
        }
        lease.released = true;

        let Some(provider) = self.provider_for(lease) else {
            return;
        };
        let result = if lease.consumed {
            provider.confirm(&lease.request_id).await
        } else {
            provider.cancel(&lease.request_id).await
        };
        if let Err(e) = result {
            tracing::warn!(
                provider = provider.name(),
                request_id = %lease.request_id,
                error = %e,
                "failed to settle number rental"
            );
        }
    }

    fn provider_for(&self, lease: &NumberLease) -> Option<&Arc<dyn OtpProvider>> {
        self.providers.iter().find(|p| p.name() == lease.provider)
    }
}

// ── SMS-Man ──────────────────────────────────────────────────────────

/// SMS-Man client. Docs: <https://api.sms-man.com/control>
pub struct SmsManProvider {
    http: Client,
    base_url: String,
    api_key: String,
    application_id: OnceCell<i64>,
}

#[derive(Deserialize)]
struct SmsManApplication {
    id: serde_json::Value,
    #[serde(default)]
    name: String,
}

impl SmsManProvider {
    pub fn new(api_key: String) -> Result<Self, OtpProviderError> {
        Self::with_base_url(api_key, "https://api.sms-man.com/control".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, OtpProviderError> {
        Ok(Self {
            http: Client::builder().timeout(HTTP_TIMEOUT).build()?,
            base_url,
            api_key,
            application_id: OnceCell::new(),
        })
    }

    async fn get(
        &self,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, OtpProviderError> {
        let url = format!("{}/{}", self.base_url, action);
        let mut query: Vec<(&str, String)> = vec![("token", self.api_key.clone())];
        query.extend_from_slice(params);

        let response = self.http.get(&url).query(&query).send().await?;
        let body: serde_json::Value = response.json().await?;

        if let Some(code) = body.get("error_code").and_then(|v| v.as_str()) {
            // "wait_sms" is a normal in-flight status, not an error.
            if code != "wait_sms" {
                let msg = body
                    .get("error_msg")
                    .and_then(|v| v.as_str())
                    .unwrap_or(code)
                    .to_string();
                return Err(OtpProviderError::Api(msg));
            }
        }
        Ok(body)
    }

    /// SMS-Man keys applications by numeric id; resolve and cache the one
    /// for the requested service name.
    async fn application_id(&self, service: &str) -> Result<i64, OtpProviderError> {
        self.application_id
            .get_or_try_init(|| async {
                let apps: Vec<SmsManApplication> =
                    serde_json::from_value(self.get("applications", &[]).await?)
                        .map_err(|e| OtpProviderError::Api(e.to_string()))?;
                apps.iter()
                    .find(|a| a.name.to_lowercase().contains(&service.to_lowercase()))
                    .and_then(|a| {
                        a.id.as_i64()
                            .or_else(|| a.id.as_str().and_then(|s| s.parse().ok()))
                    })
                    .ok_or_else(|| {
                        OtpProviderError::Api(format!("{service} not in application list"))
                    })
            })
            .await
            .map(|id| *id)
    }

    fn country_id(country: &str) -> String {
        match country.to_lowercase().as_str() {
            "india" => "14".to_string(),
            "russia" => "7".to_string(),
            "indonesia" => "62".to_string(),
            "usa" => "1".to_string(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
impl OtpProvider for SmsManProvider {
    fn name(&self) -> &str {
        "smsman"
    }

    async fn request_number(
        &self,
        country: &str,
        service: &str,
    ) -> Result<(String, String), OtpProviderError> {
        let app_id = self.application_id(service).await?;
        let body = self
            .get(
                "get-number",
                &[
                    ("country_id", Self::country_id(country)),
                    ("application_id", app_id.to_string()),
                ],
            )
            .await?;

        let request_id = body
            .get("request_id")
            .map(json_field_to_string)
            .ok_or_else(|| OtpProviderError::Api("missing request_id".into()))?;
        let phone = body
            .get("number")
            .map(json_field_to_string)
            .ok_or_else(|| OtpProviderError::Api("missing number".into()))?;
        Ok((request_id, phone))
    }

    async fn poll_code(&self, request_id: &str) -> Result<Option<String>, OtpProviderError> {
        let body = self
            .get("get-sms", &[("request_id", request_id.to_string())])
            .await;
        match body {
            Ok(body) => Ok(body.get("sms_code").map(json_field_to_string).filter(|c| !c.is_empty())),
            // Any hard API error during polling means the rental is dead.
            Err(OtpProviderError::Api(msg)) => Err(OtpProviderError::Gone(msg)),
            Err(e) => Err(e),
        }
    }

    async fn confirm(&self, request_id: &str) -> Result<(), OtpProviderError> {
        self.get(
            "set-status",
            &[("request_id", request_id.to_string()), ("status", "success".to_string())],
        )
        .await?;
        Ok(())
    }

    async fn cancel(&self, request_id: &str) -> Result<(), OtpProviderError> {
        self.get(
            "set-status",
            &[("request_id", request_id.to_string()), ("status", "reject".to_string())],
        )
        .await?;
        Ok(())
    }
}

// ── 5sim ──────────────────────────────────────────────────────────────

/// 5sim client. Docs: <https://5sim.net/docs>
pub struct FiveSimProvider {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct FiveSimOrder {
    id: serde_json::Value,
    phone: String,
}

#[derive(Deserialize)]
struct FiveSimCheck {
    #[serde(default)]
    status: String,
    #[serde(default)]
    sms: Vec<FiveSimSms>,
}

#[derive(Deserialize)]
struct FiveSimSms {
    code: Option<String>,
}

impl FiveSimProvider {
    pub fn new(api_key: String) -> Result<Self, OtpProviderError> {
        Self::with_base_url(api_key, "https://5sim.net/v1".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, OtpProviderError> {
        Ok(Self {
            http: Client::builder().timeout(HTTP_TIMEOUT).build()?,
            base_url,
            api_key,
        })
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, OtpProviderError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(OtpProviderError::Api(format!("HTTP {}", response.status())));
        }
        Ok(response)
    }
}

#[async_trait]
impl OtpProvider for FiveSimProvider {
    fn name(&self) -> &str {
        "fivesim"
    }

    async fn request_number(
        &self,
        country: &str,
        service: &str,
    ) -> Result<(String, String), OtpProviderError> {
        let order: FiveSimOrder = self
            .get(&format!("/user/buy/activation/{country}/any/{service}"))
            .await?
            .json()
            .await?;
        Ok((json_field_to_string(&order.id), order.phone))
    }

    async fn poll_code(&self, request_id: &str) -> Result<Option<String>, OtpProviderError> {
        let check: FiveSimCheck = self
            .get(&format!("/user/check/{request_id}"))
            .await?
            .json()
            .await?;
        match check.status.as_str() {
            "RECEIVED" | "FINISHED" => Ok(check.sms.first().and_then(|s| s.code.clone())),
            "CANCELED" | "TIMEOUT" | "BANNED" => Err(OtpProviderError::Gone(check.status)),
            _ => Ok(None),
        }
    }

    async fn confirm(&self, request_id: &str) -> Result<(), OtpProviderError> {
        self.get(&format!("/user/finish/{request_id}")).await?;
        Ok(())
    }

    async fn cancel(&self, request_id: &str) -> Result<(), OtpProviderError> {
        self.get(&format!("/user/cancel/{request_id}")).await?;
        Ok(())
    }
}

fn json_field_to_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
