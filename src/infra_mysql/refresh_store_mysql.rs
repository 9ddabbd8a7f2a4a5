use super::util::store_err;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use std::time::Duration;

pub struct MySqlRefreshStore {
    pool: MySqlPool,
}

impl MySqlRefreshStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlRefreshStore { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<RefreshRecord, AuthError> {
        Ok(RefreshRecord {
            subject_id: row.try_get::<SubjectId, _>("subject_id").map_err(store_err)?,
            token_digest: row.try_get("token_digest").map_err(store_err)?,
            created_at: row.try_get("created_at").map_err(store_err)?,
        })
    }
}

#[async_trait::async_trait]
impl RefreshStore for MySqlRefreshStore {
    async fn persist(&self, subject_id: SubjectId, token: &str) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO refresh_token (subject_id, token_digest, created_at)
VALUES (?, ?, ?)
"#,
        )
        .bind(subject_id)
        .bind(token_digest(token))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<RefreshRecord>, AuthError> {
        let row_opt = sqlx::query(
            r#"
SELECT subject_id, token_digest, created_at
FROM refresh_token
WHERE token_digest = ?
"#,
        )
        .bind(token_digest(token))
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn list_by_subject(
        &self,
        subject_id: SubjectId,
    ) -> Result<Vec<RefreshRecord>, AuthError> {
        let rows = sqlx::query(
            r#"
SELECT subject_id, token_digest, created_at
FROM refresh_token
WHERE subject_id = ?
ORDER BY created_at DESC, id DESC
"#,
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn prune_excess(&self, subject_id: SubjectId, keep: usize) -> Result<u64, AuthError> {
        // the derived table lets MySQL apply LIMIT inside the NOT IN
        let res = sqlx::query(
            r#"
DELETE FROM refresh_token
WHERE subject_id = ?
  AND id NOT IN (
    SELECT id FROM (
      SELECT id FROM refresh_token
      WHERE subject_id = ?
      ORDER BY created_at DESC, id DESC
      LIMIT ?
    ) AS newest
  )
"#,
        )
        .bind(subject_id)
        .bind(subject_id)
        .bind(keep as u64)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(res.rows_affected())
    }

    async fn prune_expired(&self, retention: Duration) -> Result<u64, AuthError> {
        let cutoff = Utc::now() - retention;
        let res = sqlx::query("DELETE FROM refresh_token WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(res.rows_affected())
    }

    async fn invalidate_all(
        &self,
        subject_id: SubjectId,
        except_token: Option<&str>,
    ) -> Result<u64, AuthError> {
        let keep = except_token.map(token_digest);
        let res = sqlx::query(
            r#"
DELETE FROM refresh_token
WHERE subject_id = ?
  AND (? IS NULL OR token_digest <> ?)
"#,
        )
        .bind(subject_id)
        .bind(keep.as_deref())
        .bind(keep.as_deref())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(res.rows_affected())
    }

    async fn revoke(&self, token: &str) -> Result<bool, AuthError> {
        let res = sqlx::query("DELETE FROM refresh_token WHERE token_digest = ?")
            .bind(token_digest(token))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(res.rows_affected() > 0)
    }
}
