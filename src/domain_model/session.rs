use super::{Permissions, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a verified access credential tells downstream handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub subject_id: SubjectId,
    pub permissions: Permissions,
    pub token_version: i64,
}

/// Server-side trace of an issued refresh credential.
///
/// Only the SHA-256 digest of the token is kept.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RefreshRecord {
    pub subject_id: SubjectId,
    pub token_digest: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Login,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Login => "login",
        }
    }
}
