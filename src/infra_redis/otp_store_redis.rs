use crate::domain_model::OtpPurpose;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use redis::Script;
use redis::aio::ConnectionManager;

const OTP_CONSUME: &str = include_str!("otp_consume.lua");

/// Pending codes live in a hash `{h, tries}` that expires with the code.
pub struct RedisOtpStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisOtpStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisOtpStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, identifier: &str, purpose: OtpPurpose) -> String {
        format!("{}:{}:{}", self.prefix, purpose.as_str(), identifier)
    }
}

#[async_trait::async_trait]
impl OtpStore for RedisOtpStore {
    async fn save(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
        code_digest: &str,
        expire_at: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<(), OtpStoreError> {
        let key = self.key(identifier, purpose);
        let mut conn = self.conn.clone();

        let _: () = redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .hset_multiple(
                &key,
                &[("h", code_digest.to_string()), ("tries", max_attempts.to_string())],
            )
            .ignore()
            .expire_at(&key, expire_at.timestamp())
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| OtpStoreError::Store(e.to_string()))?;

        Ok(())
    }

    async fn is_pending(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
    ) -> Result<bool, OtpStoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("EXISTS")
            .arg(self.key(identifier, purpose))
            .query_async(&mut conn)
            .await
            .map_err(|e| OtpStoreError::Store(e.to_string()))
    }

    async fn verify_and_consume(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
        provided_digest: &str,
    ) -> Result<(), OtpStoreError> {
        let key = self.key(identifier, purpose);
        let mut conn = self.conn.clone();
        let script = Script::new(OTP_CONSUME);
        let (status, left): (i64, i64) = script
            .key(&key)
            .arg(provided_digest)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| OtpStoreError::Store(e.to_string()))?;

        match status {
            1 => Ok(()),
            -1 => Err(OtpStoreError::NotFoundOrExpired),
            0 => Err(OtpStoreError::Incorrect {
                remaining_attempts: left.max(0) as u32,
            }),
            other => Err(OtpStoreError::Store(format!(
                "unknown script status {other}"
            ))),
        }
    }
}
