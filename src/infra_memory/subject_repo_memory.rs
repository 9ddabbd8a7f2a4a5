use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Process-local subject table. Provisioning goes through [`Self::insert`].
#[derive(Default)]
pub struct MemorySubjectRepo {
    subjects: DashMap<SubjectId, SubjectRecord>,
}

impl MemorySubjectRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: SubjectRecord) {
        self.subjects.insert(record.id, record);
    }

    pub fn remove(&self, id: SubjectId) -> Option<SubjectRecord> {
        self.subjects.remove(&id).map(|(_, rec)| rec)
    }

    pub fn set_status(&self, id: SubjectId, status: SubjectStatus) {
        if let Some(mut rec) = self.subjects.get_mut(&id) {
            rec.status = status;
        }
    }

    fn with_subject<T>(
        &self,
        id: SubjectId,
        f: impl FnOnce(&mut SubjectRecord) -> T,
    ) -> Result<T, AuthError> {
        let mut rec = self.subjects.get_mut(&id).ok_or(AuthError::AccountDeleted)?;
        Ok(f(rec.value_mut()))
    }
}

#[async_trait::async_trait]
impl SubjectRepo for MemorySubjectRepo {
    async fn get_by_id(&self, id: SubjectId) -> Result<Option<SubjectRecord>, AuthError> {
        Ok(self.subjects.get(&id).map(|rec| rec.value().clone()))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<SubjectRecord>, AuthError> {
        Ok(self
            .subjects
            .iter()
            .find(|rec| rec.email == email)
            .map(|rec| rec.value().clone()))
    }

    async fn record_login_failure(
        &self,
        id: SubjectId,
        failed_attempts: u32,
        lock_until: Option<DateTime<Utc>>,
    ) -> Result<(), AuthError> {
        self.with_subject(id, |rec| {
            rec.failed_attempts = failed_attempts;
            rec.lock_until = lock_until;
        })
    }

    async fn clear_login_failures(&self, id: SubjectId) -> Result<(), AuthError> {
        self.with_subject(id, |rec| {
            rec.failed_attempts = 0;
            rec.lock_until = None;
        })
    }

    async fn ensure_token_version(&self, id: SubjectId) -> Result<i64, AuthError> {
        self.with_subject(id, |rec| *rec.token_version.get_or_insert(0))
    }

    async fn bump_token_version(&self, id: SubjectId) -> Result<i64, AuthError> {
        self.with_subject(id, |rec| {
            let next = rec.current_token_version() + 1;
            rec.token_version = Some(next);
            next
        })
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
        Ok(self.subjects.iter().any(|rec| rec.email == email))
    }

    async fn update_email(&self, id: SubjectId, email: &str) -> Result<(), AuthError> {
        let taken = self
            .subjects
            .iter()
            .any(|rec| rec.id != id && rec.email == email);
        if taken {
            return Err(AuthError::EmailTaken);
        }
        self.with_subject(id, |rec| rec.email = email.to_string())
    }

    async fn update_password_hash(
        &self,
        id: SubjectId,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        self.with_subject(id, |rec| rec.password_hash = password_hash.to_string())
    }
}
