use crate::application_port::*;
use crate::domain_model::*;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Records are addressed by this digest; raw tokens never reach storage.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[async_trait::async_trait]
pub trait RefreshStore: Send + Sync {
    async fn persist(&self, subject_id: SubjectId, token: &str) -> Result<(), AuthError>;

    async fn find(&self, token: &str) -> Result<Option<RefreshRecord>, AuthError>;

    /// Newest first; equal timestamps keep the later insertion first.
    async fn list_by_subject(&self, subject_id: SubjectId)
    -> Result<Vec<RefreshRecord>, AuthError>;

    /// Deletes all but the `keep` newest records of the subject.
    async fn prune_excess(&self, subject_id: SubjectId, keep: usize) -> Result<u64, AuthError>;

    /// Deletes every record, of any subject, older than `retention`.
    async fn prune_expired(&self, retention: Duration) -> Result<u64, AuthError>;

    async fn invalidate_all(
        &self,
        subject_id: SubjectId,
        except_token: Option<&str>,
    ) -> Result<u64, AuthError>;

    async fn revoke(&self, token: &str) -> Result<bool, AuthError>;
}
