use crate::domain_model::ErrorCode;
use crate::logger::warn;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogoutReason {
    AccountDeactivated,
    AccountDeleted,
    PermissionDenied,
    AdminRequired,
    /// The server rejected the refresh credential.
    RefreshFailed,
    /// The request failed again after its one refresh-and-retry.
    RetryRejected,
    /// Auth failure right after a successful refresh.
    LoopBreaker,
    NoCredential,
}

impl LogoutReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogoutReason::AccountDeactivated => "account_deactivated",
            LogoutReason::AccountDeleted => "account_deleted",
            LogoutReason::PermissionDenied => "permission_denied",
            LogoutReason::AdminRequired => "admin_required",
            LogoutReason::RefreshFailed => "refresh_failed",
            LogoutReason::RetryRejected => "retry_rejected",
            LogoutReason::LoopBreaker => "loop_breaker",
            LogoutReason::NoCredential => "no_credential",
        }
    }

    pub fn from_code(code: ErrorCode) -> Option<Self> {
        match code {
            ErrorCode::AccountDeactivated => Some(LogoutReason::AccountDeactivated),
            ErrorCode::AccountDeleted => Some(LogoutReason::AccountDeleted),
            ErrorCode::PermissionDenied => Some(LogoutReason::PermissionDenied),
            ErrorCode::AdminRequired => Some(LogoutReason::AdminRequired),
            _ => None,
        }
    }
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the UI boundary sends a subject whose session was terminated.
pub fn login_redirect(reason: LogoutReason) -> String {
    format!("/login?reason={}", reason.as_str())
}

/// Invoked once per forced session termination.
pub trait ForcedLogout: Send + Sync {
    fn on_forced_logout(&self, reason: LogoutReason);
}

/// Default hook for headless clients: records the redirect it would perform.
#[derive(Debug, Default)]
pub struct LogForcedLogout;

impl ForcedLogout for LogForcedLogout {
    fn on_forced_logout(&self, reason: LogoutReason) {
        warn!(%reason, redirect = %login_redirect(reason), "session terminated");
    }
}
