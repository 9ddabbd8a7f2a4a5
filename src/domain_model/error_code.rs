use serde::{Deserialize, Serialize};

/// Machine-readable failure tag carried in every error body.
///
/// Clients branch on this value rather than on the HTTP status.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoToken,
    InvalidOrExpired,
    AccountDeleted,
    AccountDeactivated,
    TokenVersionMismatch,
    PermissionDenied,
    AdminRequired,
    InvalidCredentials,
    AccountLocked,
    InvalidOtp,
    EmailExists,
    BadRequest,
    NotFound,
    InternalError,
    /// Anything this build does not recognise.
    #[serde(other)]
    Unknown,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::NoToken
            | ErrorCode::InvalidOrExpired
            | ErrorCode::TokenVersionMismatch
            | ErrorCode::InvalidCredentials
            | ErrorCode::InvalidOtp => 401,
            ErrorCode::AccountDeleted
            | ErrorCode::AccountDeactivated
            | ErrorCode::PermissionDenied
            | ErrorCode::AdminRequired
            | ErrorCode::AccountLocked => 403,
            ErrorCode::EmailExists => 409,
            ErrorCode::BadRequest => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::InternalError | ErrorCode::Unknown => 500,
        }
    }

    /// Codes after which no refresh can restore the session.
    pub fn is_hard_logout(&self) -> bool {
        matches!(
            self,
            ErrorCode::AccountDeactivated
                | ErrorCode::AccountDeleted
                | ErrorCode::PermissionDenied
                | ErrorCode::AdminRequired
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_use_screaming_snake_case_on_the_wire() {
        let json = serde_json::to_string(&ErrorCode::TokenVersionMismatch).unwrap();
        assert_eq!(json, r#""TOKEN_VERSION_MISMATCH""#);

        let code: ErrorCode = serde_json::from_str(r#""ACCOUNT_DEACTIVATED""#).unwrap();
        assert_eq!(code, ErrorCode::AccountDeactivated);
    }

    #[test]
    fn unrecognised_code_decodes_as_unknown() {
        let code: ErrorCode = serde_json::from_str(r#""SOMETHING_NEW""#).unwrap();
        assert_eq!(code, ErrorCode::Unknown);
        assert!(!code.is_hard_logout());
    }
}
