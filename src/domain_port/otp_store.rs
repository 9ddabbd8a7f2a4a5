use crate::domain_model::OtpPurpose;
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait OtpStore: Send + Sync {
    /// Replaces any pending code for the same identifier and purpose.
    async fn save(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
        code_digest: &str,
        expire_at: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<(), OtpStoreError>;

    /// Whether an unexpired code is waiting for this identifier and purpose.
    async fn is_pending(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
    ) -> Result<bool, OtpStoreError>;

    /// Deletes the record on a match. A miss burns one attempt; the record
    /// is dropped once no attempts remain.
    async fn verify_and_consume(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
        provided_digest: &str,
    ) -> Result<(), OtpStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum OtpStoreError {
    #[error("incorrect code, {remaining_attempts} attempt(s) left")]
    Incorrect { remaining_attempts: u32 },
    #[error("OTP not found or expired")]
    NotFoundOrExpired,
    #[error("infra error: {0}")]
    Store(String),
}
