use super::cookie::CookiePolicy;
use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::RefreshStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::header::SET_COOKIE;
use warp::{self, Reply, reject};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpChallengeResponse {
    pub identifier: String,
    pub otp_expires_at: DateTime<Utc>,
}

impl From<OtpChallenge> for OtpChallengeResponse {
    fn from(challenge: OtpChallenge) -> Self {
        OtpChallengeResponse {
            identifier: challenge.identifier,
            otp_expires_at: challenge.expires_at,
        }
    }
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl Reply, warp::Rejection> {
    let login_input = LoginInput {
        email: body.email,
        password: body.password,
    };
    let challenge = auth_service
        .login(login_input)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&OtpChallengeResponse::from(challenge)))
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub identifier: String,
    pub otp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResponse {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub maintenance: bool,
    pub user: SubjectProjection,
}

pub async fn verify_otp(
    body: VerifyOtpRequest,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: Arc<CookiePolicy>,
) -> Result<impl Reply, warp::Rejection> {
    let verify_input = VerifyOtpInput {
        identifier: body.identifier,
        otp: body.otp,
    };
    let result = auth_service
        .verify_otp(verify_input)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    let cookie = cookie_policy.issue(&result.refresh_token.0);
    let response = VerifyOtpResponse {
        access_token: result.access.access_token.0,
        access_token_expires_at: result.access.expires_at,
        maintenance: result.maintenance,
        user: result.subject,
    };

    Ok(warp::reply::with_header(
        warp::reply::json(&response),
        SET_COOKIE,
        cookie,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub identifier: String,
    #[serde(default = "default_purpose")]
    pub purpose: OtpPurpose,
}

fn default_purpose() -> OtpPurpose {
    OtpPurpose::Login
}

pub async fn resend_otp(
    body: ResendOtpRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl Reply, warp::Rejection> {
    let challenge = auth_service
        .resend_otp(&body.identifier, body.purpose)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&OtpChallengeResponse::from(challenge)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
}

pub async fn refresh_token(
    refresh_cookie: Option<String>,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl Reply, warp::Rejection> {
    let token = refresh_cookie
        .filter(|t| !t.is_empty())
        .ok_or_else(|| reject::custom(ApiError::from(AuthError::NoToken)))?;

    let issued = auth_service
        .refresh(&token)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&AccessResponse {
        access_token: issued.access_token.0,
        access_token_expires_at: issued.expires_at,
    }))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn logout(
    refresh_cookie: Option<String>,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: Arc<CookiePolicy>,
) -> Result<impl Reply, warp::Rejection> {
    auth_service
        .logout(refresh_cookie.as_deref().filter(|t| !t.is_empty()))
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    let response = MessageResponse {
        message: "Logged out".to_string(),
    };
    Ok(warp::reply::with_header(
        warp::reply::json(&response),
        SET_COOKIE,
        cookie_policy.expire(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCredentialsRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCredentialsResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_expires_at: Option<DateTime<Utc>>,
}

pub async fn update_credentials(
    ctx: AuthContext,
    body: UpdateCredentialsRequest,
    refresh_cookie: Option<String>,
    credential_service: Arc<dyn CredentialService>,
) -> Result<impl Reply, warp::Rejection> {
    let input = UpdateCredentialsInput {
        email: body.email,
        password: body.password,
    };
    let result = credential_service
        .update_credentials(&ctx, refresh_cookie.as_deref(), input)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    let (access_token, access_token_expires_at) = match result.access {
        Some(access) => (Some(access.access_token.0), Some(access.expires_at)),
        None => (None, None),
    };
    Ok(warp::reply::json(&UpdateCredentialsResponse {
        message: result.message,
        access_token,
        access_token_expires_at,
    }))
}

pub async fn me(ctx: AuthContext) -> Result<impl Reply, warp::Rejection> {
    Ok(warp::reply::json(&ctx))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Leading characters of the stored digest, enough to tell sessions apart.
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

pub async fn subject_sessions(
    subject_id: SubjectId,
    _admin: AuthContext,
    refresh_store: Arc<dyn RefreshStore>,
) -> Result<impl Reply, warp::Rejection> {
    let records = refresh_store
        .list_by_subject(subject_id)
        .await
        .map_err(ApiError::from)
        .map_err(reject::custom)?;

    let sessions: Vec<SessionSummary> = records
        .into_iter()
        .map(|r| SessionSummary {
            fingerprint: r.token_digest.chars().take(12).collect(),
            created_at: r.created_at,
        })
        .collect();
    Ok(warp::reply::json(&sessions))
}
