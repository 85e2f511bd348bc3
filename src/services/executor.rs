//! Shared contract for the per-platform step executors.
//!
//! Executors never raise uncaught: every failure mode is translated into a
//! [`StepError`] at this boundary, and the orchestrator turns that into a
//! retryable or terminal step state. Executors also never establish logins;
//! an authenticated session or device capability is supplied externally and
//! only checked as a precondition.

use async_trait::async_trait;

use crate::models::identity::Identity;
use crate::models::platform::Platform;
use crate::services::browser::BridgeError;
use crate::services::device::CloudPhoneError;
use crate::services::otp::OtpError;

/// Presence created by a successful step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSuccess {
    pub handle: String,
    pub url: String,
    pub external_id: Option<String>,
}

/// Failure taxonomy surfaced to the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The external session is missing or logged out. Retrying is useless
    /// until an operator re-runs the login setup.
    #[error("session not ready: {0}")]
    SessionNotReady(String),

    /// Naming collision on the platform; needs a manual rename.
    #[error("handle unavailable: {0}")]
    HandleUnavailable(String),

    #[error("no verification code arrived within the timeout")]
    OtpTimeout,

    #[error("no phone number available from any configured provider")]
    NoNumberAvailable,

    /// Transient external failure, worth retrying with backoff.
    #[error("external service error: {0}")]
    External(String),
}

impl StepError {
    pub fn is_retryable(&self) -> bool {
        match self {
            StepError::SessionNotReady(_) | StepError::HandleUnavailable(_) => false,
            StepError::OtpTimeout | StepError::NoNumberAvailable | StepError::External(_) => true,
        }
    }
}

impl From<BridgeError> for StepError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::SessionExpired => StepError::SessionNotReady(e.to_string()),
            BridgeError::HandleTaken(detail) => StepError::HandleUnavailable(detail),
            other => StepError::External(other.to_string()),
        }
    }
}

impl From<CloudPhoneError> for StepError {
    fn from(e: CloudPhoneError) -> Self {
        match e {
            CloudPhoneError::UsernameTaken(detail) => StepError::HandleUnavailable(detail),
            other => StepError::External(other.to_string()),
        }
    }
}

impl From<OtpError> for StepError {
    fn from(e: OtpError) -> Self {
        match e {
            OtpError::Timeout => StepError::OtpTimeout,
            OtpError::NoNumberAvailable => StepError::NoNumberAvailable,
        }
    }
}

/// One platform's provisioning flow. Exactly one external presence is
/// created per successful call; idempotency across retries is enforced at
/// the orchestration boundary, which never dispatches a step that already
/// succeeded.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    fn platform(&self) -> Platform;

    async fn execute(&self, identity: &Identity) -> Result<StepSuccess, StepError>;
}
