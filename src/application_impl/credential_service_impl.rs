use super::auth_service_impl::normalize_email;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct RealCredentialService {
    subject_repo: Arc<dyn SubjectRepo>,
    refresh_store: Arc<dyn RefreshStore>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    access_ttl: Duration,
    min_password_len: usize,
}

impl RealCredentialService {
    pub fn new(
        subject_repo: Arc<dyn SubjectRepo>,
        refresh_store: Arc<dyn RefreshStore>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        access_ttl: Duration,
    ) -> Self {
        Self {
            subject_repo,
            refresh_store,
            credential_hasher,
            token_codec,
            access_ttl,
            min_password_len: 8,
        }
    }

    pub fn with_min_password_len(mut self, min_password_len: usize) -> Self {
        self.min_password_len = min_password_len;
        self
    }

    /// Rejects an email the subject cannot take. Writes nothing.
    async fn check_email(&self, rec: &SubjectRecord, email: &str) -> Result<bool, AuthError> {
        if email == rec.email {
            return Ok(false);
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidInput("email is malformed".to_string()));
        }
        if self.subject_repo.email_exists(email).await? {
            return Err(AuthError::EmailTaken);
        }
        Ok(true)
    }

    fn check_password(&self, password: &str) -> Result<(), AuthError> {
        if password.len() < self.min_password_len {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {} characters",
                self.min_password_len
            )));
        }
        Ok(())
    }

    /// Bumps the token version, stores the new hash, revokes every other
    /// device and re-issues access for the caller. The version is bumped
    /// before the new hash is stored.
    async fn change_password(
        &self,
        rec: &SubjectRecord,
        password_hash: &str,
        current_refresh: Option<&str>,
    ) -> Result<IssuedAccess, AuthError> {
        let token_version = self.subject_repo.bump_token_version(rec.id).await?;
        self.subject_repo
            .update_password_hash(rec.id, password_hash)
            .await?;
        let revoked = self
            .refresh_store
            .invalidate_all(rec.id, current_refresh)
            .await?;

        let (access_token, expires_at) = self.token_codec.mint_access(
            rec.id,
            &rec.permissions,
            token_version,
            self.access_ttl,
        )?;

        info!(subject = %rec.id, token_version, revoked, "password changed");
        Ok(IssuedAccess {
            access_token,
            expires_at,
        })
    }
}

#[async_trait::async_trait]
impl CredentialService for RealCredentialService {
    async fn update_credentials(
        &self,
        ctx: &AuthContext,
        current_refresh: Option<&str>,
        input: UpdateCredentialsInput,
    ) -> Result<UpdateCredentialsResult, AuthError> {
        let email = input
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty());
        let password = input.password.filter(|p| !p.is_empty());
        if email.is_none() && password.is_none() {
            return Err(AuthError::InvalidInput("nothing to update".to_string()));
        }

        let rec = self
            .subject_repo
            .get_by_id(ctx.subject_id)
            .await?
            .ok_or(AuthError::AccountDeleted)?;

        // every check runs before the first write
        let new_email = match email.as_deref() {
            Some(email) if self.check_email(&rec, email).await? => Some(email),
            _ => None,
        };
        let password_hash = match password.as_deref() {
            Some(password) => {
                self.check_password(password)?;
                Some(self.credential_hasher.hash_password(password).await?)
            }
            None => None,
        };

        if let Some(email) = new_email {
            self.subject_repo.update_email(rec.id, email).await?;
            info!(subject = %rec.id, "email changed");
        }

        let access = match password_hash.as_deref() {
            Some(hash) => Some(self.change_password(&rec, hash, current_refresh).await?),
            None => None,
        };

        let message = match (email.is_some(), access.is_some()) {
            (true, true) => "Email and password updated",
            (false, true) => "Password updated",
            _ => "Email updated",
        };
        Ok(UpdateCredentialsResult {
            message: message.to_string(),
            access,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{
        Argon2PasswordHasher, JwtConfig, JwtHs256Codec, RealSessionVerifier,
    };
    use crate::infra_memory::*;
    use chrono::Utc;

    struct Fixture {
        service: RealCredentialService,
        verifier: RealSessionVerifier,
        subjects: Arc<MemorySubjectRepo>,
        refresh: Arc<MemoryRefreshStore>,
        codec: Arc<JwtHs256Codec>,
        ctx: AuthContext,
    }

    fn subject(email: &str, version: Option<i64>) -> SubjectRecord {
        SubjectRecord {
            id: SubjectId::new_v4(),
            email: email.to_string(),
            password_hash: String::new(),
            status: SubjectStatus::Active,
            token_version: version,
            permissions: [("orders.read", true)].into_iter().collect(),
            failed_attempts: 0,
            lock_until: None,
            created_at: Utc::now(),
        }
    }

    fn fixture() -> Fixture {
        let subjects = Arc::new(MemorySubjectRepo::new());
        let refresh = Arc::new(MemoryRefreshStore::new());
        let codec = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: "test".to_string(),
            audience: "test".to_string(),
            signing_key: b"secret".to_vec(),
        }));
        let me = subject("me@example.com", Some(0));
        let ctx = AuthContext {
            subject_id: me.id,
            permissions: me.permissions.clone(),
            token_version: 0,
        };
        subjects.insert(me);
        subjects.insert(subject("taken@example.com", None));

        Fixture {
            service: RealCredentialService::new(
                subjects.clone(),
                refresh.clone(),
                Arc::new(Argon2PasswordHasher),
                codec.clone(),
                Duration::from_secs(900),
            ),
            verifier: RealSessionVerifier::new(codec.clone(), subjects.clone()),
            subjects,
            refresh,
            codec,
            ctx,
        }
    }

    #[tokio::test]
    async fn password_change_revokes_other_devices_and_reissues_access() {
        let f = fixture();
        let (old_access, _) = f
            .codec
            .mint_access(f.ctx.subject_id, &f.ctx.permissions, 0, Duration::from_secs(900))
            .unwrap();
        f.refresh.persist(f.ctx.subject_id, "this-device").await.unwrap();
        f.refresh.persist(f.ctx.subject_id, "other-device").await.unwrap();

        let result = f
            .service
            .update_credentials(
                &f.ctx,
                Some("this-device"),
                UpdateCredentialsInput {
                    email: None,
                    password: Some("a-much-better-pass".to_string()),
                },
            )
            .await
            .unwrap();

        let fresh = result.access.expect("password change re-issues access");
        let claims = f.codec.decode_access(&fresh.access_token.0).unwrap();
        assert_eq!(claims.token_version, 1);

        assert!(f.refresh.find("this-device").await.unwrap().is_some());
        assert!(f.refresh.find("other-device").await.unwrap().is_none());

        let old_header = format!("Bearer {}", old_access.0);
        assert!(matches!(
            f.verifier.verify(Some(&old_header)).await,
            Err(AuthError::TokenVersionMismatch)
        ));
        let new_header = format!("Bearer {}", fresh.access_token.0);
        assert!(f.verifier.verify(Some(&new_header)).await.is_ok());
    }

    #[tokio::test]
    async fn email_change_checks_uniqueness_without_revoking() {
        let f = fixture();
        f.refresh.persist(f.ctx.subject_id, "other-device").await.unwrap();

        let taken = f
            .service
            .update_credentials(
                &f.ctx,
                None,
                UpdateCredentialsInput {
                    email: Some("Taken@Example.com".to_string()),
                    password: None,
                },
            )
            .await;
        assert!(matches!(taken, Err(AuthError::EmailTaken)));

        let ok = f
            .service
            .update_credentials(
                &f.ctx,
                None,
                UpdateCredentialsInput {
                    email: Some("new@example.com".to_string()),
                    password: None,
                },
            )
            .await
            .unwrap();
        assert!(ok.access.is_none());
        assert!(f.refresh.find("other-device").await.unwrap().is_some());
        let rec = f.subjects.get_by_id(f.ctx.subject_id).await.unwrap().unwrap();
        assert_eq!(rec.email, "new@example.com");
        assert_eq!(rec.token_version, Some(0));
    }

    #[tokio::test]
    async fn rejected_combined_update_writes_nothing() {
        let f = fixture();
        f.refresh.persist(f.ctx.subject_id, "other-device").await.unwrap();

        let short = f
            .service
            .update_credentials(
                &f.ctx,
                None,
                UpdateCredentialsInput {
                    email: Some("new@example.com".to_string()),
                    password: Some("short".to_string()),
                },
            )
            .await;
        assert!(matches!(short, Err(AuthError::InvalidInput(_))));

        let taken = f
            .service
            .update_credentials(
                &f.ctx,
                None,
                UpdateCredentialsInput {
                    email: Some("taken@example.com".to_string()),
                    password: Some("a-much-better-pass".to_string()),
                },
            )
            .await;
        assert!(matches!(taken, Err(AuthError::EmailTaken)));

        let rec = f.subjects.get_by_id(f.ctx.subject_id).await.unwrap().unwrap();
        assert_eq!(rec.email, "me@example.com");
        assert_eq!(rec.password_hash, "");
        assert_eq!(rec.token_version, Some(0));
        assert!(f.refresh.find("other-device").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_update_and_short_password_are_rejected() {
        let f = fixture();
        assert!(matches!(
            f.service
                .update_credentials(&f.ctx, None, UpdateCredentialsInput::default())
                .await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            f.service
                .update_credentials(
                    &f.ctx,
                    None,
                    UpdateCredentialsInput {
                        email: None,
                        password: Some("short".to_string()),
                    },
                )
                .await,
            Err(AuthError::InvalidInput(_))
        ));
        let rec = f.subjects.get_by_id(f.ctx.subject_id).await.unwrap().unwrap();
        assert_eq!(rec.token_version, Some(0));
    }
}
