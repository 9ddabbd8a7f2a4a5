use super::{InboundResponse, LogoutReason};
use crate::domain_model::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailurePolicy {
    /// Not an auth failure; hand the response to the caller.
    PassThrough,
    HardLogout(LogoutReason),
    /// The server saw no credential and there was none to send.
    Unauthenticated,
    /// Refresh once and replay. Guarded requests also respect the loop breaker.
    RefreshOnce { loop_guarded: bool },
}

pub(crate) fn classify(response: &InboundResponse, sent_credential: bool) -> FailurePolicy {
    if !response.is_auth_failure() {
        return FailurePolicy::PassThrough;
    }

    match response.error_code() {
        Some(code) if code.is_hard_logout() => match LogoutReason::from_code(code) {
            Some(reason) => FailurePolicy::HardLogout(reason),
            None => FailurePolicy::RefreshOnce { loop_guarded: true },
        },
        Some(ErrorCode::NoToken) if !sent_credential => FailurePolicy::Unauthenticated,
        Some(ErrorCode::TokenVersionMismatch) => FailurePolicy::RefreshOnce {
            loop_guarded: false,
        },
        _ => FailurePolicy::RefreshOnce { loop_guarded: true },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resp(status: u16, code: &str) -> InboundResponse {
        InboundResponse {
            status,
            body: json!({ "code": code, "message": "" }),
        }
    }

    #[test]
    fn hard_logout_codes_never_refresh() {
        for (status, code, reason) in [
            (403, "ACCOUNT_DEACTIVATED", LogoutReason::AccountDeactivated),
            (403, "ACCOUNT_DELETED", LogoutReason::AccountDeleted),
            (403, "PERMISSION_DENIED", LogoutReason::PermissionDenied),
            (403, "ADMIN_REQUIRED", LogoutReason::AdminRequired),
        ] {
            assert_eq!(
                classify(&resp(status, code), true),
                FailurePolicy::HardLogout(reason)
            );
        }
    }

    #[test]
    fn version_mismatch_bypasses_loop_breaker() {
        assert_eq!(
            classify(&resp(401, "TOKEN_VERSION_MISMATCH"), true),
            FailurePolicy::RefreshOnce {
                loop_guarded: false
            }
        );
        assert_eq!(
            classify(&resp(401, "INVALID_OR_EXPIRED"), true),
            FailurePolicy::RefreshOnce { loop_guarded: true }
        );
    }

    #[test]
    fn generic_auth_failures_refresh_once() {
        let bare = InboundResponse {
            status: 403,
            body: serde_json::Value::Null,
        };
        assert_eq!(
            classify(&bare, true),
            FailurePolicy::RefreshOnce { loop_guarded: true }
        );
        assert_eq!(
            classify(&resp(500, "INTERNAL_ERROR"), true),
            FailurePolicy::PassThrough
        );
    }

    #[test]
    fn missing_token_depends_on_what_was_sent() {
        assert_eq!(
            classify(&resp(401, "NO_TOKEN"), false),
            FailurePolicy::Unauthenticated
        );
        assert_eq!(
            classify(&resp(401, "NO_TOKEN"), true),
            FailurePolicy::RefreshOnce { loop_guarded: true }
        );
    }
}
