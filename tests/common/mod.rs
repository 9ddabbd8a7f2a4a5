#![allow(dead_code)]

use chrono::Utc;
use sessionward::api::v1::CookiePolicy;
use sessionward::application_impl::*;
use sessionward::application_port::*;
use sessionward::domain_model::*;
use sessionward::domain_port::*;
use sessionward::infra_memory::*;
use sessionward::server::*;
use std::sync::{Arc, Mutex};

pub const PASSWORD: &str = "correct horse battery";

#[derive(Default)]
pub struct CapturingSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingSender {
    pub fn last_code(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl OtpSender for CapturingSender {
    async fn send(&self, email: &str, _purpose: OtpPurpose, code: &str) -> Result<(), AuthError> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub server: Arc<Server>,
    pub subjects: Arc<MemorySubjectRepo>,
    pub refresh_store: Arc<MemoryRefreshStore>,
    pub sender: Arc<CapturingSender>,
    hashed_password: String,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_cookie_policy(CookiePolicy::default()).await
    }

    pub async fn with_cookie_policy(cookie_policy: CookiePolicy) -> Self {
        let subjects = Arc::new(MemorySubjectRepo::new());
        let refresh_store = Arc::new(MemoryRefreshStore::new());
        let sender = Arc::new(CapturingSender::default());
        let hasher = Arc::new(Argon2PasswordHasher);
        let hashed_password = hasher.hash_password(PASSWORD).await.unwrap();

        let server = Server::assemble(ServerParts {
            subject_repo: subjects.clone(),
            refresh_store: refresh_store.clone(),
            otp_store: Arc::new(MemoryOtpStore::new()),
            otp_sender: sender.clone(),
            credential_hasher: hasher,
            token_codec: Arc::new(JwtHs256Codec::new(JwtConfig {
                issuer: "sessionward.test".to_string(),
                audience: "sessionward-tests".to_string(),
                signing_key: b"integration-signing-key".to_vec(),
            })),
            policy: IssuerPolicy::default(),
            cookie_policy,
            min_password_len: 8,
        });

        Harness {
            server: Arc::new(server),
            subjects,
            refresh_store,
            sender,
            hashed_password,
        }
    }

    pub fn add_subject(&self, email: &str, permissions: &[(&str, bool)]) -> SubjectId {
        let id = SubjectId::new_v4();
        self.subjects.insert(SubjectRecord {
            id,
            email: email.to_string(),
            password_hash: self.hashed_password.clone(),
            status: SubjectStatus::Active,
            token_version: None,
            permissions: permissions.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            failed_attempts: 0,
            lock_until: None,
            created_at: Utc::now(),
        });
        id
    }
}

/// Value of the `refresh_token` cookie in a `Set-Cookie` header.
pub fn refresh_cookie_value(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.trim().strip_prefix("refresh_token="))
        .unwrap_or_default()
        .to_string()
}
