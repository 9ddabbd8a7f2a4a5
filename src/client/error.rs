use super::LogoutReason;
use crate::domain_model::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Connect(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Outcome shared by the refresh leader and every waiter queued behind it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh rejected with status {status}")]
    Rejected {
        status: u16,
        code: Option<ErrorCode>,
    },
    #[error("refresh transport failure: {0}")]
    Transport(TransportError),
    #[error("refresh timed out")]
    TimedOut,
    #[error("coordinator disposed")]
    Disposed,
    #[error("refresh leader went away before finishing")]
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session ended: {0}")]
    LoggedOut(LogoutReason),
    #[error(transparent)]
    Refresh(RefreshError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("coordinator disposed")]
    Disposed,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("credential storage io: {0}")]
    Io(#[from] std::io::Error),
}
