use crate::application_port::AuthError;
use crate::domain_model::OtpPurpose;
use crate::domain_port::OtpSender;
use tracing::info;

/// Development sender: writes the code to the log instead of mailing it.
#[derive(Debug, Default)]
pub struct LogOtpSender;

#[async_trait::async_trait]
impl OtpSender for LogOtpSender {
    async fn send(&self, email: &str, purpose: OtpPurpose, code: &str) -> Result<(), AuthError> {
        info!(email, purpose = purpose.as_str(), code, "one-time code issued");
        Ok(())
    }
}
