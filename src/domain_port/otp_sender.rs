use crate::application_port::AuthError;
use crate::domain_model::OtpPurpose;

/// Out-of-band delivery of one-time codes (email in production).
#[async_trait::async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, email: &str, purpose: OtpPurpose, code: &str) -> Result<(), AuthError>;
}
