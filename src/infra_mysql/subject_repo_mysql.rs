use super::util::{is_dup_key, store_err};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

const SUBJECT_COLUMNS: &str = "subject_id, email, password_hash, status, token_version, \
     permissions, failed_attempts, lock_until, created_at";

pub struct MySqlSubjectRepo {
    pool: MySqlPool,
}

impl MySqlSubjectRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlSubjectRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<SubjectRecord, AuthError> {
        let status: String = row.try_get("status").map_err(store_err)?;
        let status = status.parse::<SubjectStatus>().map_err(AuthError::Store)?;

        let permissions: String = row.try_get("permissions").map_err(store_err)?;
        let permissions: Permissions = serde_json::from_str(&permissions)
            .map_err(|e| AuthError::Store(format!("permissions decode: {e}")))?;

        Ok(SubjectRecord {
            id: row.try_get::<SubjectId, _>("subject_id").map_err(store_err)?,
            email: row.try_get("email").map_err(store_err)?,
            password_hash: row.try_get("password_hash").map_err(store_err)?,
            status,
            token_version: row.try_get("token_version").map_err(store_err)?,
            permissions,
            failed_attempts: row.try_get("failed_attempts").map_err(store_err)?,
            lock_until: row.try_get("lock_until").map_err(store_err)?,
            created_at: row.try_get("created_at").map_err(store_err)?,
        })
    }

    fn require_row(rows_affected: u64) -> Result<(), AuthError> {
        if rows_affected == 0 {
            Err(AuthError::AccountDeleted)
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl SubjectRepo for MySqlSubjectRepo {
    async fn get_by_id(&self, id: SubjectId) -> Result<Option<SubjectRecord>, AuthError> {
        let row_opt = sqlx::query(&format!(
            "SELECT {SUBJECT_COLUMNS} FROM subject WHERE subject_id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<SubjectRecord>, AuthError> {
        let row_opt = sqlx::query(&format!(
            "SELECT {SUBJECT_COLUMNS} FROM subject WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn record_login_failure(
        &self,
        id: SubjectId,
        failed_attempts: u32,
        lock_until: Option<DateTime<Utc>>,
    ) -> Result<(), AuthError> {
        let res = sqlx::query(
            r#"
UPDATE subject SET failed_attempts = ?, lock_until = ?
WHERE subject_id = ?
"#,
        )
        .bind(failed_attempts)
        .bind(lock_until)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Self::require_row(res.rows_affected())
    }

    async fn clear_login_failures(&self, id: SubjectId) -> Result<(), AuthError> {
        sqlx::query(
            r#"
UPDATE subject SET failed_attempts = 0, lock_until = NULL
WHERE subject_id = ?
"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn ensure_token_version(&self, id: SubjectId) -> Result<i64, AuthError> {
        sqlx::query("UPDATE subject SET token_version = 0 WHERE subject_id = ? AND token_version IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        let version: Option<Option<i64>> =
            sqlx::query_scalar("SELECT token_version FROM subject WHERE subject_id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;

        version
            .ok_or(AuthError::AccountDeleted)
            .map(|v| v.unwrap_or(0))
    }

    async fn bump_token_version(&self, id: SubjectId) -> Result<i64, AuthError> {
        // LAST_INSERT_ID(expr) hands the incremented value back in the same statement
        let res = sqlx::query(
            r#"
UPDATE subject SET token_version = LAST_INSERT_ID(COALESCE(token_version, 0) + 1)
WHERE subject_id = ?
"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Self::require_row(res.rows_affected())?;
        Ok(res.last_insert_id() as i64)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subject WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(count > 0)
    }

    async fn update_email(&self, id: SubjectId, email: &str) -> Result<(), AuthError> {
        let res = sqlx::query("UPDATE subject SET email = ? WHERE subject_id = ?")
            .bind(email)
            .bind(id)
            .execute(&self.pool)
            .await;

        match res {
            Ok(done) => Self::require_row(done.rows_affected()),
            Err(e) if is_dup_key(&e) => Err(AuthError::EmailTaken),
            Err(e) => Err(store_err(e)),
        }
    }

    async fn update_password_hash(
        &self,
        id: SubjectId,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        let res = sqlx::query("UPDATE subject SET password_hash = ? WHERE subject_id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        Self::require_row(res.rows_affected())
    }
}
