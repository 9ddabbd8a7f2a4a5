use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct SubjectId(pub uuid::Uuid);

impl SubjectId {
    pub fn new_v4() -> Self {
        SubjectId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SubjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(SubjectId)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectStatus {
    Active,
    Inactive,
}

impl SubjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectStatus::Active => "active",
            SubjectStatus::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for SubjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubjectStatus::Active),
            "inactive" => Ok(SubjectStatus::Inactive),
            other => Err(format!("unknown subject status: {other}")),
        }
    }
}

/// Capability key that grants the admin-only routes.
pub const ADMIN_PERMISSION: &str = "admin";

/// Point-in-time copy of a subject's capability flags.
///
/// A key that is missing and a key mapped to `false` are equivalent.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(pub BTreeMap<String, bool>);

impl Permissions {
    pub fn has(&self, permission: &str) -> bool {
        self.0.get(permission).copied().unwrap_or(false)
    }

    pub fn has_all(&self, permissions: &[&str]) -> bool {
        permissions.iter().all(|p| self.has(p))
    }

    pub fn has_any(&self, permissions: &[&str]) -> bool {
        permissions.iter().any(|p| self.has(p))
    }

    pub fn is_admin(&self) -> bool {
        self.has(ADMIN_PERMISSION)
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for Permissions {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        Permissions(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Subject fields that are safe to hand back to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProjection {
    pub id: SubjectId,
    pub email: String,
    pub status: SubjectStatus,
    pub permissions: Permissions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_false_permissions_are_denied() {
        let perms: Permissions = [("orders.read", true), ("orders.write", false)]
            .into_iter()
            .collect();

        assert!(perms.has("orders.read"));
        assert!(!perms.has("orders.write"));
        assert!(!perms.has("labels.print"));
        assert!(perms.has_any(&["orders.write", "orders.read"]));
        assert!(!perms.has_all(&["orders.write", "orders.read"]));
        assert!(!perms.is_admin());
    }

    #[test]
    fn permissions_serialize_as_plain_map() {
        let perms: Permissions = [(ADMIN_PERMISSION, true)].into_iter().collect();
        let json = serde_json::to_string(&perms).unwrap();
        assert_eq!(json, r#"{"admin":true}"#);
        assert!(perms.is_admin());
    }
}
