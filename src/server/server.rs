use crate::api::v1::CookiePolicy;
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{DevSubject, Settings};
use anyhow::anyhow;
use chrono::Utc;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

/// Everything the HTTP layer needs, already wired.
pub struct ServerParts {
    pub subject_repo: Arc<dyn SubjectRepo>,
    pub refresh_store: Arc<dyn RefreshStore>,
    pub otp_store: Arc<dyn OtpStore>,
    pub otp_sender: Arc<dyn OtpSender>,
    pub credential_hasher: Arc<dyn CredentialHasher>,
    pub token_codec: Arc<dyn TokenCodec>,
    pub policy: IssuerPolicy,
    pub cookie_policy: CookiePolicy,
    pub min_password_len: usize,
}

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub credential_service: Arc<dyn CredentialService>,
    pub session_verifier: Arc<dyn SessionVerifier>,
    pub refresh_store: Arc<dyn RefreshStore>,
    pub cookie_policy: CookiePolicy,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let signing_key = std::env::var("JWT_SIGNING_KEY")
            .ok()
            .or_else(|| settings.auth.signing_key.clone())
            .ok_or_else(|| anyhow!("JWT_SIGNING_KEY is not set"))?
            .into_bytes();
        let otp_hmac_key = std::env::var("OTP_HMAC_KEY")
            .ok()
            .or_else(|| settings.otp.hmac_key.clone())
            .ok_or_else(|| anyhow!("OTP_HMAC_KEY is not set"))?
            .into_bytes();

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: settings.auth.issuer.clone(),
            audience: settings.auth.audience.clone(),
            signing_key,
        }));

        let (subject_repo, refresh_store, pool): (
            Arc<dyn SubjectRepo>,
            Arc<dyn RefreshStore>,
            Option<Pool<MySql>>,
        ) = match settings.storage.backend.as_str() {
            "memory" => {
                let subject_repo = Arc::new(MemorySubjectRepo::new());
                seed_dev_subjects(&subject_repo, &settings.dev_subjects, &credential_hasher)
                    .await?;
                (subject_repo, Arc::new(MemoryRefreshStore::new()), None)
            }
            "mysql" => {
                let dsn = settings
                    .storage
                    .mysql_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("storage.mysql_url is required for mysql"))?;
                let pool = Pool::<MySql>::connect(dsn).await?;
                (
                    Arc::new(MySqlSubjectRepo::new(pool.clone())),
                    Arc::new(MySqlRefreshStore::new(pool.clone())),
                    Some(pool),
                )
            }
            other => return Err(anyhow!("Unknown storage backend: {}", other)),
        };

        let otp_store: Arc<dyn OtpStore> = match settings.otp.backend.as_str() {
            "memory" => Arc::new(MemoryOtpStore::new()),
            "redis" => {
                let dsn = settings
                    .otp
                    .redis_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("otp.redis_url is required for redis"))?;
                let redis_client = redis::Client::open(dsn)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisOtpStore::new(
                    redis_manager,
                    settings.otp.key_prefix.clone(),
                ))
            }
            other => return Err(anyhow!("Unknown otp backend: {}", other)),
        };

        let policy = IssuerPolicy {
            access_ttl: Duration::from_secs(settings.auth.access_ttl_secs),
            refresh_ttl: Duration::from_secs(settings.auth.refresh_ttl_secs),
            otp_ttl: Duration::from_secs(settings.otp.ttl_secs),
            otp_max_attempts: settings.otp.max_attempts,
            otp_hmac_key,
            max_failed_logins: settings.auth.max_failed_logins,
            lockout: Duration::from_secs(settings.auth.lockout_secs),
            refresh_keep: settings.auth.refresh_keep,
            refresh_retention: Duration::from_secs(settings.auth.refresh_retention_secs),
            maintenance: settings.auth.maintenance,
        };
        let cookie_policy = CookiePolicy {
            secure: settings.http.cookie_secure,
            max_age: policy.refresh_ttl,
        };

        let mut server = Self::assemble(ServerParts {
            subject_repo,
            refresh_store,
            otp_store,
            otp_sender: Arc::new(LogOtpSender),
            credential_hasher,
            token_codec,
            policy,
            cookie_policy,
            min_password_len: settings.auth.min_password_len,
        });
        server.pool = pool;

        info!(
            storage = %settings.storage.backend,
            otp = %settings.otp.backend,
            "server started"
        );
        Ok(server)
    }

    pub fn assemble(parts: ServerParts) -> Self {
        let session_verifier: Arc<dyn SessionVerifier> = Arc::new(RealSessionVerifier::new(
            parts.token_codec.clone(),
            parts.subject_repo.clone(),
        ));

        let credential_service: Arc<dyn CredentialService> = Arc::new(
            RealCredentialService::new(
                parts.subject_repo.clone(),
                parts.refresh_store.clone(),
                parts.credential_hasher.clone(),
                parts.token_codec.clone(),
                parts.policy.access_ttl,
            )
            .with_min_password_len(parts.min_password_len),
        );

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            parts.subject_repo,
            parts.refresh_store.clone(),
            parts.otp_store,
            parts.otp_sender,
            parts.credential_hasher,
            parts.token_codec,
            parts.policy,
        ));

        Self {
            auth_service,
            credential_service,
            session_verifier,
            refresh_store: parts.refresh_store,
            cookie_policy: parts.cookie_policy,
            pool: None,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

async fn seed_dev_subjects(
    repo: &MemorySubjectRepo,
    subjects: &[DevSubject],
    credential_hasher: &Arc<dyn CredentialHasher>,
) -> anyhow::Result<()> {
    for dev in subjects {
        let password_hash = credential_hasher.hash_password(&dev.password).await?;
        let record = SubjectRecord {
            id: SubjectId::new_v4(),
            email: dev.email.trim().to_lowercase(),
            password_hash,
            status: dev.status,
            token_version: None,
            permissions: dev.permissions.clone(),
            failed_attempts: 0,
            lock_until: None,
            created_at: Utc::now(),
        };
        debug!(subject = %record.id, email = %record.email, "dev subject seeded");
        repo.insert(record);
    }
    Ok(())
}
