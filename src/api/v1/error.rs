use crate::application_port::*;
use crate::domain_model::ErrorCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::convert::Infallible;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_until: Option<DateTime<Utc>>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            remaining_attempts: None,
            lock_until: None,
        }
    }

    pub fn internal<E: std::fmt::Display>(error: E) -> Self {
        warn!("Internal error: {}", error);
        ApiError::new(ErrorCode::InternalError, "Internal error")
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl reject::Reject for ApiError {}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let code = error.code();
        match error {
            AuthError::Store(e) | AuthError::InternalError(e) => ApiError::internal(e),
            AuthError::InvalidCredentials { remaining_attempts }
            | AuthError::InvalidOtp { remaining_attempts } => ApiError {
                remaining_attempts,
                ..ApiError::new(code, error.to_string())
            },
            AuthError::Locked { lock_until } => ApiError {
                lock_until: Some(lock_until),
                ..ApiError::new(code, "Account temporarily locked")
            },
            other => ApiError::new(code, other.to_string()),
        }
    }
}

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let api_error = if let Some(e) = err.find::<ApiError>() {
        e.clone()
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        ApiError::new(ErrorCode::BadRequest, e.to_string())
    } else if err.find::<reject::UnsupportedMediaType>().is_some()
        || err.find::<reject::InvalidQuery>().is_some()
        || err.find::<reject::PayloadTooLarge>().is_some()
    {
        ApiError::new(ErrorCode::BadRequest, "Malformed request")
    } else if err.is_not_found() || err.find::<reject::MethodNotAllowed>().is_some() {
        ApiError::new(ErrorCode::NotFound, "Not found")
    } else {
        ApiError::internal(format!("Unhandled error: {:?}", err))
    };

    let status = api_error.status();
    Ok(warp::reply::with_status(
        warp::reply::json(&api_error),
        status,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockout_carries_lock_until_and_403() {
        let lock_until = Utc::now();
        let api = ApiError::from(AuthError::Locked { lock_until });

        assert_eq!(api.status(), StatusCode::FORBIDDEN);
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["code"], "ACCOUNT_LOCKED");
        assert!(json.get("lockUntil").is_some());
        assert!(json.get("remainingAttempts").is_none());
    }

    #[test]
    fn store_failures_are_opaque() {
        let api = ApiError::from(AuthError::Store("connection reset by mysql".into()));

        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message, "Internal error");
    }

    #[test]
    fn invalid_otp_message_and_attempts() {
        let api = ApiError::from(AuthError::InvalidOtp {
            remaining_attempts: Some(4),
        });

        assert_eq!(api.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(api.message, "Invalid or expired OTP");
        assert_eq!(api.remaining_attempts, Some(4));
    }
}
