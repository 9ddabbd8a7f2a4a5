use crate::domain_model::OtpPurpose;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

struct PendingOtp {
    digest: String,
    expire_at: DateTime<Utc>,
    remaining: u32,
}

#[derive(Default)]
pub struct MemoryOtpStore {
    codes: DashMap<(String, OtpPurpose), PendingOtp>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl OtpStore for MemoryOtpStore {
    async fn save(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
        code_digest: &str,
        expire_at: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<(), OtpStoreError> {
        self.codes.insert(
            (identifier.to_string(), purpose),
            PendingOtp {
                digest: code_digest.to_string(),
                expire_at,
                remaining: max_attempts,
            },
        );
        Ok(())
    }

    async fn is_pending(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
    ) -> Result<bool, OtpStoreError> {
        let now = Utc::now();
        Ok(self
            .codes
            .get(&(identifier.to_string(), purpose))
            .is_some_and(|otp| otp.expire_at > now))
    }

    async fn verify_and_consume(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
        provided_digest: &str,
    ) -> Result<(), OtpStoreError> {
        let key = (identifier.to_string(), purpose);
        let now = Utc::now();

        // match-and-delete is one step so a code can only be redeemed once
        if self
            .codes
            .remove_if(&key, |_, otp| otp.expire_at > now && otp.digest == provided_digest)
            .is_some()
        {
            return Ok(());
        }

        let remaining = {
            let Some(mut otp) = self.codes.get_mut(&key) else {
                return Err(OtpStoreError::NotFoundOrExpired);
            };
            if otp.expire_at <= now {
                None
            } else {
                otp.remaining = otp.remaining.saturating_sub(1);
                Some(otp.remaining)
            }
        };

        match remaining {
            Some(left) if left > 0 => Err(OtpStoreError::Incorrect {
                remaining_attempts: left,
            }),
            Some(_) => {
                self.codes.remove(&key);
                Err(OtpStoreError::Incorrect {
                    remaining_attempts: 0,
                })
            }
            None => {
                self.codes.remove(&key);
                Err(OtpStoreError::NotFoundOrExpired)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn code_is_single_use() {
        let store = MemoryOtpStore::new();
        let exp = Utc::now() + Duration::minutes(5);
        store.save("a@x.io", OtpPurpose::Login, "d1", exp, 5).await.unwrap();

        store
            .verify_and_consume("a@x.io", OtpPurpose::Login, "d1")
            .await
            .unwrap();
        assert!(matches!(
            store.verify_and_consume("a@x.io", OtpPurpose::Login, "d1").await,
            Err(OtpStoreError::NotFoundOrExpired)
        ));
    }

    #[tokio::test]
    async fn wrong_codes_burn_attempts_until_the_record_is_gone() {
        let store = MemoryOtpStore::new();
        let exp = Utc::now() + Duration::minutes(5);
        store.save("a@x.io", OtpPurpose::Login, "d1", exp, 2).await.unwrap();

        assert!(matches!(
            store.verify_and_consume("a@x.io", OtpPurpose::Login, "bad").await,
            Err(OtpStoreError::Incorrect { remaining_attempts: 1 })
        ));
        assert!(matches!(
            store.verify_and_consume("a@x.io", OtpPurpose::Login, "bad").await,
            Err(OtpStoreError::Incorrect { remaining_attempts: 0 })
        ));
        assert!(matches!(
            store.verify_and_consume("a@x.io", OtpPurpose::Login, "d1").await,
            Err(OtpStoreError::NotFoundOrExpired)
        ));
    }

    #[tokio::test]
    async fn pending_tracks_saved_and_consumed_codes() {
        let store = MemoryOtpStore::new();
        assert!(!store.is_pending("a@x.io", OtpPurpose::Login).await.unwrap());

        let exp = Utc::now() + Duration::minutes(5);
        store.save("a@x.io", OtpPurpose::Login, "d1", exp, 5).await.unwrap();
        assert!(store.is_pending("a@x.io", OtpPurpose::Login).await.unwrap());

        store
            .verify_and_consume("a@x.io", OtpPurpose::Login, "d1")
            .await
            .unwrap();
        assert!(!store.is_pending("a@x.io", OtpPurpose::Login).await.unwrap());

        let stale = Utc::now() - Duration::seconds(1);
        store.save("a@x.io", OtpPurpose::Login, "d2", stale, 5).await.unwrap();
        assert!(!store.is_pending("a@x.io", OtpPurpose::Login).await.unwrap());
    }

    #[tokio::test]
    async fn expired_code_is_rejected_even_when_correct() {
        let store = MemoryOtpStore::new();
        let exp = Utc::now() - Duration::seconds(1);
        store.save("a@x.io", OtpPurpose::Login, "d1", exp, 5).await.unwrap();

        assert!(matches!(
            store.verify_and_consume("a@x.io", OtpPurpose::Login, "d1").await,
            Err(OtpStoreError::NotFoundOrExpired)
        ));
    }
}
