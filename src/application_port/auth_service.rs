use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("no access token provided")]
    NoToken,
    #[error("token is invalid or expired")]
    InvalidOrExpired,
    #[error("account no longer exists")]
    AccountDeleted,
    #[error("account is deactivated")]
    AccountDeactivated,
    #[error("token version mismatch")]
    TokenVersionMismatch,
    #[error("permission denied")]
    PermissionDenied,
    #[error("admin access required")]
    AdminRequired,
    #[error("invalid email or password")]
    InvalidCredentials { remaining_attempts: Option<u32> },
    #[error("account locked until {lock_until}")]
    Locked { lock_until: DateTime<Utc> },
    #[error("Invalid or expired OTP")]
    InvalidOtp { remaining_attempts: Option<u32> },
    #[error("email already exists")]
    EmailTaken,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AuthError::NoToken => ErrorCode::NoToken,
            AuthError::InvalidOrExpired => ErrorCode::InvalidOrExpired,
            AuthError::AccountDeleted => ErrorCode::AccountDeleted,
            AuthError::AccountDeactivated => ErrorCode::AccountDeactivated,
            AuthError::TokenVersionMismatch => ErrorCode::TokenVersionMismatch,
            AuthError::PermissionDenied => ErrorCode::PermissionDenied,
            AuthError::AdminRequired => ErrorCode::AdminRequired,
            AuthError::InvalidCredentials { .. } => ErrorCode::InvalidCredentials,
            AuthError::Locked { .. } => ErrorCode::AccountLocked,
            AuthError::InvalidOtp { .. } => ErrorCode::InvalidOtp,
            AuthError::EmailTaken => ErrorCode::EmailExists,
            AuthError::InvalidInput(_) => ErrorCode::BadRequest,
            AuthError::Store(_) | AuthError::InternalError(_) => ErrorCode::InternalError,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct RefreshToken(pub String);

/// Claims recovered from a verified access credential.
#[derive(Debug, Clone)]
pub struct AccessClaims {
    pub subject_id: SubjectId,
    pub permissions: Permissions,
    pub token_version: i64,
    pub expires_at: DateTime<Utc>,
}

/// Claims recovered from a verified refresh credential.
#[derive(Debug, Clone)]
pub struct RefreshClaims {
    pub subject_id: SubjectId,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

pub trait TokenCodec: Send + Sync {
    fn mint_access(
        &self,
        subject: SubjectId,
        permissions: &Permissions,
        token_version: i64,
        ttl: Duration,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError>;

    fn mint_refresh(
        &self,
        subject: SubjectId,
        ttl: Duration,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError>;

    /// Signature, expiry, issuer and audience are checked together; any
    /// failure is `AuthError::InvalidOrExpired`.
    fn decode_access(&self, token: &str) -> Result<AccessClaims, AuthError>;

    fn decode_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub identifier: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VerifyOtpInput {
    pub identifier: String,
    pub otp: String,
}

#[derive(Debug, Clone)]
pub struct IssuedAccess {
    pub access_token: AccessToken,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub access: IssuedAccess,
    pub refresh_token: RefreshToken,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub subject: SubjectProjection,
    pub maintenance: bool,
}

/// Two-phase issuance plus the endpoints that live beside it.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Password phase. On success an OTP has been dispatched out of band.
    async fn login(&self, request: LoginInput) -> Result<OtpChallenge, AuthError>;

    /// OTP phase. Consumes the OTP and issues the credential pair.
    async fn verify_otp(&self, request: VerifyOtpInput) -> Result<LoginResult, AuthError>;

    async fn resend_otp(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
    ) -> Result<OtpChallenge, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<IssuedAccess, AuthError>;

    async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AuthError>;
}
