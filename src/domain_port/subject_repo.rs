use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct SubjectRecord {
    pub id: SubjectId,
    pub email: String,
    pub password_hash: String,
    pub status: SubjectStatus,
    /// `None` for accounts provisioned before versioning; read as 0.
    pub token_version: Option<i64>,
    pub permissions: Permissions,
    pub failed_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SubjectRecord {
    pub fn current_token_version(&self) -> i64 {
        self.token_version.unwrap_or(0)
    }

    pub fn is_active(&self) -> bool {
        self.status == SubjectStatus::Active
    }

    pub fn projection(&self) -> SubjectProjection {
        SubjectProjection {
            id: self.id,
            email: self.email.clone(),
            status: self.status,
            permissions: self.permissions.clone(),
        }
    }
}

/// Every method is a single atomic statement against the backing store.
#[async_trait::async_trait]
pub trait SubjectRepo: Send + Sync {
    async fn get_by_id(&self, id: SubjectId) -> Result<Option<SubjectRecord>, AuthError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<SubjectRecord>, AuthError>;

    async fn record_login_failure(
        &self,
        id: SubjectId,
        failed_attempts: u32,
        lock_until: Option<DateTime<Utc>>,
    ) -> Result<(), AuthError>;

    async fn clear_login_failures(&self, id: SubjectId) -> Result<(), AuthError>;

    /// Persists 0 when no version is stored yet and returns the current value.
    async fn ensure_token_version(&self, id: SubjectId) -> Result<i64, AuthError>;

    /// Increments the stored version by one and returns the new value.
    async fn bump_token_version(&self, id: SubjectId) -> Result<i64, AuthError>;

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError>;

    /// Fails with `AuthError::EmailTaken` if another subject owns `email`.
    async fn update_email(&self, id: SubjectId, email: &str) -> Result<(), AuthError>;

    async fn update_password_hash(&self, id: SubjectId, password_hash: &str)
    -> Result<(), AuthError>;
}
