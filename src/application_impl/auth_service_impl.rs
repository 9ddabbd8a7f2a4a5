use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use hmac::{Hmac, KeyInit, Mac};
use nanoid::nanoid;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const OTP_ALPHABET: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];
const OTP_LENGTH: usize = 6;

/// Knobs of the issuance state machine.
#[derive(Debug, Clone)]
pub struct IssuerPolicy {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub otp_ttl: Duration,
    pub otp_max_attempts: u32,
    pub otp_hmac_key: Vec<u8>,
    pub max_failed_logins: u32,
    pub lockout: Duration,
    pub refresh_keep: usize,
    pub refresh_retention: Duration,
    pub maintenance: bool,
}

impl Default for IssuerPolicy {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            otp_ttl: Duration::from_secs(5 * 60),
            otp_max_attempts: 5,
            otp_hmac_key: b"dev-otp-key".to_vec(),
            max_failed_logins: 5,
            lockout: Duration::from_secs(15 * 60),
            refresh_keep: 2,
            refresh_retention: Duration::from_secs(7 * 24 * 60 * 60),
            maintenance: false,
        }
    }
}

impl From<OtpStoreError> for AuthError {
    fn from(error: OtpStoreError) -> Self {
        match error {
            OtpStoreError::Incorrect { remaining_attempts } => AuthError::InvalidOtp {
                remaining_attempts: Some(remaining_attempts),
            },
            OtpStoreError::NotFoundOrExpired => AuthError::InvalidOtp {
                remaining_attempts: None,
            },
            OtpStoreError::Store(e) => AuthError::Store(e),
        }
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct RealAuthService {
    subject_repo: Arc<dyn SubjectRepo>,
    refresh_store: Arc<dyn RefreshStore>,
    otp_store: Arc<dyn OtpStore>,
    otp_sender: Arc<dyn OtpSender>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    policy: IssuerPolicy,
}

impl RealAuthService {
    pub fn new(
        subject_repo: Arc<dyn SubjectRepo>,
        refresh_store: Arc<dyn RefreshStore>,
        otp_store: Arc<dyn OtpStore>,
        otp_sender: Arc<dyn OtpSender>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        policy: IssuerPolicy,
    ) -> Self {
        Self {
            subject_repo,
            refresh_store,
            otp_store,
            otp_sender,
            credential_hasher,
            token_codec,
            policy,
        }
    }

    fn otp_digest(&self, identifier: &str, code: &str) -> Result<String, AuthError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.policy.otp_hmac_key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        mac.update(identifier.as_bytes());
        mac.update(b":");
        mac.update(code.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn issue_otp(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
    ) -> Result<OtpChallenge, AuthError> {
        let code = nanoid!(OTP_LENGTH, &OTP_ALPHABET);
        let digest = self.otp_digest(identifier, &code)?;
        let expires_at = Utc::now() + self.policy.otp_ttl;

        self.otp_store
            .save(
                identifier,
                purpose,
                &digest,
                expires_at,
                self.policy.otp_max_attempts,
            )
            .await?;
        self.otp_sender.send(identifier, purpose, &code).await?;

        debug!(identifier, purpose = purpose.as_str(), "otp dispatched");
        Ok(OtpChallenge {
            identifier: identifier.to_string(),
            expires_at,
        })
    }

    /// Counts a wrong password and returns the error the caller should see.
    async fn register_failure(
        &self,
        rec: &SubjectRecord,
        now: DateTime<Utc>,
    ) -> Result<AuthError, AuthError> {
        let attempts = rec.failed_attempts + 1;
        if attempts >= self.policy.max_failed_logins {
            let lock_until = now + self.policy.lockout;
            self.subject_repo
                .record_login_failure(rec.id, 0, Some(lock_until))
                .await?;
            info!(subject = %rec.id, %lock_until, "login locked after repeated failures");
            return Ok(AuthError::Locked { lock_until });
        }

        self.subject_repo
            .record_login_failure(rec.id, attempts, None)
            .await?;
        Ok(AuthError::InvalidCredentials {
            remaining_attempts: Some(self.policy.max_failed_logins - attempts),
        })
    }

    /// Opportunistic global purge; never fails the caller.
    async fn housekeeping(&self) {
        match self
            .refresh_store
            .prune_expired(self.policy.refresh_retention)
            .await
        {
            Ok(0) => {}
            Ok(n) => debug!(purged = n, "expired refresh records removed"),
            Err(e) => warn!("refresh housekeeping failed: {}", e),
        }
    }

    fn active_lock(rec: &SubjectRecord, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        rec.lock_until.filter(|until| *until > now)
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn login(&self, request: LoginInput) -> Result<OtpChallenge, AuthError> {
        let email = normalize_email(&request.email);
        if email.is_empty() || request.password.is_empty() {
            return Err(AuthError::InvalidInput(
                "email and password are required".to_string(),
            ));
        }

        let rec = self
            .subject_repo
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials {
                remaining_attempts: None,
            })?;

        let now = Utc::now();
        if let Some(lock_until) = Self::active_lock(&rec, now) {
            return Err(AuthError::Locked { lock_until });
        }

        let ok = self
            .credential_hasher
            .verify_password(&request.password, &rec.password_hash)
            .await?;
        if !ok {
            return Err(self.register_failure(&rec, now).await?);
        }

        if rec.failed_attempts > 0 || rec.lock_until.is_some() {
            self.subject_repo.clear_login_failures(rec.id).await?;
        }

        if !rec.is_active() {
            return Err(AuthError::AccountDeactivated);
        }

        self.issue_otp(&rec.email, OtpPurpose::Login).await
    }

    async fn verify_otp(&self, request: VerifyOtpInput) -> Result<LoginResult, AuthError> {
        let identifier = normalize_email(&request.identifier);
        let digest = self.otp_digest(&identifier, request.otp.trim())?;
        self.otp_store
            .verify_and_consume(&identifier, OtpPurpose::Login, &digest)
            .await?;

        let rec = self
            .subject_repo
            .get_by_email(&identifier)
            .await?
            .ok_or(AuthError::AccountDeleted)?;
        if !rec.is_active() {
            return Err(AuthError::AccountDeactivated);
        }

        let token_version = self.subject_repo.ensure_token_version(rec.id).await?;

        let (access_token, access_exp) = self.token_codec.mint_access(
            rec.id,
            &rec.permissions,
            token_version,
            self.policy.access_ttl,
        )?;
        let (refresh_token, refresh_exp) = self
            .token_codec
            .mint_refresh(rec.id, self.policy.refresh_ttl)?;

        self.refresh_store.persist(rec.id, &refresh_token.0).await?;
        self.refresh_store
            .prune_excess(rec.id, self.policy.refresh_keep)
            .await?;
        self.housekeeping().await;

        info!(subject = %rec.id, token_version, "login completed");

        Ok(LoginResult {
            access: IssuedAccess {
                access_token,
                expires_at: access_exp,
            },
            refresh_token,
            refresh_token_expires_at: refresh_exp,
            subject: rec.projection(),
            maintenance: self.policy.maintenance,
        })
    }

    /// Replaces a pending code only; a resend never starts a challenge.
    async fn resend_otp(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
    ) -> Result<OtpChallenge, AuthError> {
        let identifier = normalize_email(identifier);
        let now = Utc::now();

        let subject = match self.subject_repo.get_by_email(&identifier).await? {
            Some(rec) if rec.is_active() => {
                let pending = self.otp_store.is_pending(&rec.email, purpose).await?;
                pending.then_some(rec)
            }
            _ => None,
        };

        match subject {
            Some(rec) => {
                if let Some(lock_until) = Self::active_lock(&rec, now) {
                    return Err(AuthError::Locked { lock_until });
                }
                self.issue_otp(&rec.email, purpose).await
            }
            None => {
                // same answer as a real dispatch so addresses cannot be probed
                debug!("otp resend ignored without a pending challenge");
                Ok(OtpChallenge {
                    identifier,
                    expires_at: now + self.policy.otp_ttl,
                })
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<IssuedAccess, AuthError> {
        let claims = self.token_codec.decode_refresh(refresh_token)?;

        let record = self
            .refresh_store
            .find(refresh_token)
            .await?
            .ok_or(AuthError::InvalidOrExpired)?;
        if record.subject_id != claims.subject_id {
            return Err(AuthError::InvalidOrExpired);
        }

        let rec = self
            .subject_repo
            .get_by_id(claims.subject_id)
            .await?
            .ok_or(AuthError::AccountDeleted)?;
        if !rec.is_active() {
            return Err(AuthError::AccountDeactivated);
        }

        let token_version = self.subject_repo.ensure_token_version(rec.id).await?;
        let (access_token, expires_at) = self.token_codec.mint_access(
            rec.id,
            &rec.permissions,
            token_version,
            self.policy.access_ttl,
        )?;

        debug!(subject = %rec.id, token_version, "access token refreshed");
        Ok(IssuedAccess {
            access_token,
            expires_at,
        })
    }

    async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError> {
        if let Some(token) = refresh_token {
            let revoked = self.refresh_store.revoke(token).await?;
            debug!(revoked, "logout");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{Argon2PasswordHasher, JwtConfig, JwtHs256Codec};
    use crate::infra_memory::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingSender {
        sent: Mutex<Vec<String>>,
    }

    impl CapturingSender {
        fn last(&self) -> String {
            self.sent.lock().unwrap().last().cloned().unwrap()
        }
        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl OtpSender for CapturingSender {
        async fn send(&self, _email: &str, _purpose: OtpPurpose, code: &str) -> Result<(), AuthError> {
            self.sent.lock().unwrap().push(code.to_string());
            Ok(())
        }
    }

    struct Fixture {
        service: RealAuthService,
        subjects: Arc<MemorySubjectRepo>,
        refresh: Arc<MemoryRefreshStore>,
        sender: Arc<CapturingSender>,
        codec: Arc<JwtHs256Codec>,
        subject_id: SubjectId,
    }

    async fn fixture() -> Fixture {
        let subjects = Arc::new(MemorySubjectRepo::new());
        let refresh = Arc::new(MemoryRefreshStore::new());
        let sender = Arc::new(CapturingSender::default());
        let codec = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: "test".to_string(),
            audience: "test".to_string(),
            signing_key: b"secret".to_vec(),
        }));
        let hasher = Argon2PasswordHasher;
        let subject_id = SubjectId::new_v4();
        subjects.insert(SubjectRecord {
            id: subject_id,
            email: "ops@example.com".to_string(),
            password_hash: hasher.hash_password("hunter22").await.unwrap(),
            status: SubjectStatus::Active,
            token_version: None,
            permissions: [("orders.read", true)].into_iter().collect(),
            failed_attempts: 0,
            lock_until: None,
            created_at: Utc::now(),
        });

        let service = RealAuthService::new(
            subjects.clone(),
            refresh.clone(),
            Arc::new(MemoryOtpStore::new()),
            sender.clone(),
            Arc::new(Argon2PasswordHasher),
            codec.clone(),
            IssuerPolicy::default(),
        );
        Fixture {
            service,
            subjects,
            refresh,
            sender,
            codec,
            subject_id,
        }
    }

    fn login(password: &str) -> LoginInput {
        LoginInput {
            email: " Ops@Example.com ".to_string(),
            password: password.to_string(),
        }
    }

    fn otp(code: String) -> VerifyOtpInput {
        VerifyOtpInput {
            identifier: "ops@example.com".to_string(),
            otp: code,
        }
    }

    #[tokio::test]
    async fn two_phase_login_issues_version_zero_credentials() {
        let f = fixture().await;
        let challenge = f.service.login(login("hunter22")).await.unwrap();
        assert_eq!(challenge.identifier, "ops@example.com");

        let result = f.service.verify_otp(otp(f.sender.last())).await.unwrap();
        let claims = f.codec.decode_access(&result.access.access_token.0).unwrap();
        assert_eq!(claims.subject_id, f.subject_id);
        assert_eq!(claims.token_version, 0);
        assert!(claims.permissions.has("orders.read"));
        assert_eq!(result.subject.email, "ops@example.com");

        let stored = f.subjects.get_by_id(f.subject_id).await.unwrap().unwrap();
        assert_eq!(stored.token_version, Some(0));
        assert!(f.refresh.find(&result.refresh_token.0).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn otp_cannot_be_replayed() {
        let f = fixture().await;
        f.service.login(login("hunter22")).await.unwrap();
        let code = f.sender.last();

        f.service.verify_otp(otp(code.clone())).await.unwrap();
        let second = f.service.verify_otp(otp(code)).await;
        match second {
            Err(e @ AuthError::InvalidOtp { .. }) => {
                assert_eq!(e.to_string(), "Invalid or expired OTP")
            }
            other => panic!("expected InvalidOtp, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_otp_reports_remaining_attempts() {
        let f = fixture().await;
        f.service.login(login("hunter22")).await.unwrap();
        let code = f.sender.last();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        assert!(matches!(
            f.service.verify_otp(otp(wrong.to_string())).await,
            Err(AuthError::InvalidOtp { remaining_attempts: Some(4) })
        ));
        f.service.verify_otp(otp(code)).await.unwrap();
    }

    #[tokio::test]
    async fn fifth_failure_locks_and_lock_skips_password_check() {
        let f = fixture().await;
        for left in (1..=4).rev() {
            match f.service.login(login("nope")).await {
                Err(AuthError::InvalidCredentials { remaining_attempts }) => {
                    assert_eq!(remaining_attempts, Some(left))
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        let lock_until = match f.service.login(login("nope")).await {
            Err(AuthError::Locked { lock_until }) => lock_until,
            other => panic!("expected lock, got {other:?}"),
        };
        assert!(lock_until > Utc::now());

        // correct password is not even looked at while locked
        match f.service.login(login("hunter22")).await {
            Err(AuthError::Locked { lock_until: again }) => assert_eq!(again, lock_until),
            other => panic!("expected lock, got {other:?}"),
        }
        assert_eq!(f.sender.count(), 0);
    }

    #[tokio::test]
    async fn expired_lock_allows_login_and_resets_counter() {
        let f = fixture().await;
        f.subjects
            .record_login_failure(f.subject_id, 0, Some(Utc::now() - chrono::Duration::seconds(1)))
            .await
            .unwrap();

        f.service.login(login("hunter22")).await.unwrap();
        let stored = f.subjects.get_by_id(f.subject_id).await.unwrap().unwrap();
        assert_eq!(stored.failed_attempts, 0);
        assert!(stored.lock_until.is_none());
    }

    #[tokio::test]
    async fn inactive_subject_gets_no_otp() {
        let f = fixture().await;
        f.subjects.set_status(f.subject_id, SubjectStatus::Inactive);

        assert!(matches!(
            f.service.login(login("hunter22")).await,
            Err(AuthError::AccountDeactivated)
        ));
        assert_eq!(f.sender.count(), 0);
    }

    #[tokio::test]
    async fn login_never_leaves_more_than_two_refresh_records() {
        let f = fixture().await;
        let old = Utc::now() - chrono::Duration::days(1);
        for i in 0..5 {
            f.refresh.persist_at(f.subject_id, &format!("stale-{i}"), old);
        }

        f.service.login(login("hunter22")).await.unwrap();
        let result = f.service.verify_otp(otp(f.sender.last())).await.unwrap();

        let records = f.refresh.list_by_subject(f.subject_id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].token_digest, token_digest(&result.refresh_token.0));
    }

    #[tokio::test]
    async fn refresh_follows_current_version_and_revocation() {
        let f = fixture().await;
        f.service.login(login("hunter22")).await.unwrap();
        let result = f.service.verify_otp(otp(f.sender.last())).await.unwrap();
        let refresh = result.refresh_token.0;

        f.subjects.bump_token_version(f.subject_id).await.unwrap();
        let issued = f.service.refresh(&refresh).await.unwrap();
        let claims = f.codec.decode_access(&issued.access_token.0).unwrap();
        assert_eq!(claims.token_version, 1);

        f.service.logout(Some(&refresh)).await.unwrap();
        assert!(matches!(
            f.service.refresh(&refresh).await,
            Err(AuthError::InvalidOrExpired)
        ));
    }

    #[tokio::test]
    async fn refresh_rejects_deleted_and_deactivated_subjects() {
        let f = fixture().await;
        f.service.login(login("hunter22")).await.unwrap();
        let refresh = f.service.verify_otp(otp(f.sender.last())).await.unwrap().refresh_token.0;

        f.subjects.set_status(f.subject_id, SubjectStatus::Inactive);
        assert!(matches!(
            f.service.refresh(&refresh).await,
            Err(AuthError::AccountDeactivated)
        ));

        f.subjects.remove(f.subject_id);
        assert!(matches!(
            f.service.refresh(&refresh).await,
            Err(AuthError::AccountDeleted)
        ));
    }

    #[tokio::test]
    async fn resend_replaces_the_pending_code() {
        let f = fixture().await;
        f.service.login(login("hunter22")).await.unwrap();
        let first = f.sender.last();
        f.service
            .resend_otp("ops@example.com", OtpPurpose::Login)
            .await
            .unwrap();
        let second = f.sender.last();
        assert_eq!(f.sender.count(), 2);

        if first != second {
            assert!(f.service.verify_otp(otp(first)).await.is_err());
        }
        f.service.verify_otp(otp(second)).await.unwrap();
    }

    #[tokio::test]
    async fn resend_without_password_step_sends_nothing() {
        let f = fixture().await;
        let challenge = f
            .service
            .resend_otp("ops@example.com", OtpPurpose::Login)
            .await
            .unwrap();
        assert_eq!(challenge.identifier, "ops@example.com");
        assert_eq!(f.sender.count(), 0);

        // nothing to redeem either
        let guessed = f.service.verify_otp(otp("000000".to_string())).await;
        assert!(matches!(
            guessed,
            Err(AuthError::InvalidOtp { remaining_attempts: None })
        ));
    }

    #[tokio::test]
    async fn resend_after_redeemed_code_sends_nothing() {
        let f = fixture().await;
        f.service.login(login("hunter22")).await.unwrap();
        f.service.verify_otp(otp(f.sender.last())).await.unwrap();

        f.service
            .resend_otp("ops@example.com", OtpPurpose::Login)
            .await
            .unwrap();
        assert_eq!(f.sender.count(), 1);
    }

    #[tokio::test]
    async fn resend_for_unknown_identifier_sends_nothing() {
        let f = fixture().await;
        f.service
            .resend_otp("nobody@example.com", OtpPurpose::Login)
            .await
            .unwrap();
        assert_eq!(f.sender.count(), 0);
    }
}
