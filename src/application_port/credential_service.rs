use crate::application_port::{AuthError, IssuedAccess};
use crate::domain_model::AuthContext;

#[derive(Debug, Clone, Default)]
pub struct UpdateCredentialsInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateCredentialsResult {
    pub message: String,
    /// Present only when the password changed and every older access
    /// credential stopped verifying.
    pub access: Option<IssuedAccess>,
}

#[async_trait::async_trait]
pub trait CredentialService: Send + Sync {
    /// `current_refresh` is the caller's own refresh credential; it survives
    /// a password change while every other session of the subject is revoked.
    async fn update_credentials(
        &self,
        ctx: &AuthContext,
        current_refresh: Option<&str>,
        input: UpdateCredentialsInput,
    ) -> Result<UpdateCredentialsResult, AuthError>;
}
