use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;

pub struct RealSessionVerifier {
    token_codec: Arc<dyn TokenCodec>,
    subject_repo: Arc<dyn SubjectRepo>,
}

impl RealSessionVerifier {
    pub fn new(token_codec: Arc<dyn TokenCodec>, subject_repo: Arc<dyn SubjectRepo>) -> Self {
        Self {
            token_codec,
            subject_repo,
        }
    }

    fn bearer(authorization: Option<&str>) -> Result<&str, AuthError> {
        authorization
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NoToken)
    }
}

#[async_trait::async_trait]
impl SessionVerifier for RealSessionVerifier {
    async fn verify(&self, authorization: Option<&str>) -> Result<AuthContext, AuthError> {
        let token = Self::bearer(authorization)?;
        let claims = self.token_codec.decode_access(token)?;

        let subject = self
            .subject_repo
            .get_by_id(claims.subject_id)
            .await?
            .ok_or(AuthError::AccountDeleted)?;
        if !subject.is_active() {
            return Err(AuthError::AccountDeactivated);
        }
        if claims.token_version != subject.current_token_version() {
            return Err(AuthError::TokenVersionMismatch);
        }

        Ok(AuthContext {
            subject_id: claims.subject_id,
            permissions: claims.permissions,
            token_version: claims.token_version,
        })
    }
}
