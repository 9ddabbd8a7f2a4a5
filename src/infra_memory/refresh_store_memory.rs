use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

struct Entry {
    record: RefreshRecord,
    seq: u64,
}

#[derive(Default)]
pub struct MemoryRefreshStore {
    records: DashMap<String, Entry>,
    seq: AtomicU64,
}

impl MemoryRefreshStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record with an explicit creation time.
    pub fn persist_at(&self, subject_id: SubjectId, token: &str, created_at: DateTime<Utc>) {
        let digest = token_digest(token);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.records.insert(
            digest.clone(),
            Entry {
                record: RefreshRecord {
                    subject_id,
                    token_digest: digest,
                    created_at,
                },
                seq,
            },
        );
    }

    fn sorted_for(&self, subject_id: SubjectId) -> Vec<(RefreshRecord, u64)> {
        let mut rows: Vec<(RefreshRecord, u64)> = self
            .records
            .iter()
            .filter(|e| e.record.subject_id == subject_id)
            .map(|e| (e.record.clone(), e.seq))
            .collect();
        rows.sort_by(|a, b| {
            b.0.created_at
                .cmp(&a.0.created_at)
                .then_with(|| b.1.cmp(&a.1))
        });
        rows
    }

    fn remove_all(&self, digests: Vec<String>) -> u64 {
        digests
            .into_iter()
            .filter(|d| self.records.remove(d).is_some())
            .count() as u64
    }
}

#[async_trait::async_trait]
impl RefreshStore for MemoryRefreshStore {
    async fn persist(&self, subject_id: SubjectId, token: &str) -> Result<(), AuthError> {
        self.persist_at(subject_id, token, Utc::now());
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<RefreshRecord>, AuthError> {
        Ok(self
            .records
            .get(&token_digest(token))
            .map(|e| e.record.clone()))
    }

    async fn list_by_subject(
        &self,
        subject_id: SubjectId,
    ) -> Result<Vec<RefreshRecord>, AuthError> {
        Ok(self
            .sorted_for(subject_id)
            .into_iter()
            .map(|(rec, _)| rec)
            .collect())
    }

    async fn prune_excess(&self, subject_id: SubjectId, keep: usize) -> Result<u64, AuthError> {
        let excess = self
            .sorted_for(subject_id)
            .into_iter()
            .skip(keep)
            .map(|(rec, _)| rec.token_digest)
            .collect();
        Ok(self.remove_all(excess))
    }

    async fn prune_expired(&self, retention: Duration) -> Result<u64, AuthError> {
        let cutoff = Utc::now() - retention;
        let expired = self
            .records
            .iter()
            .filter(|e| e.record.created_at < cutoff)
            .map(|e| e.key().clone())
            .collect();
        Ok(self.remove_all(expired))
    }

    async fn invalidate_all(
        &self,
        subject_id: SubjectId,
        except_token: Option<&str>,
    ) -> Result<u64, AuthError> {
        let keep = except_token.map(token_digest);
        let doomed = self
            .records
            .iter()
            .filter(|e| e.record.subject_id == subject_id)
            .filter(|e| keep.as_deref() != Some(e.key().as_str()))
            .map(|e| e.key().clone())
            .collect();
        Ok(self.remove_all(doomed))
    }

    async fn revoke(&self, token: &str) -> Result<bool, AuthError> {
        Ok(self.records.remove(&token_digest(token)).is_some())
    }
}
