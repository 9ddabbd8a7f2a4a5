use crate::application_port::AuthError;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait SessionVerifier: Send + Sync {
    /// Runs the header → decode → lookup → status → version pipeline.
    ///
    /// `authorization` is the raw `Authorization` header value, if any.
    async fn verify(&self, authorization: Option<&str>) -> Result<AuthContext, AuthError>;
}

pub fn require_permission(ctx: &AuthContext, permission: &str) -> Result<(), AuthError> {
    if ctx.permissions.has(permission) {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied)
    }
}

pub fn require_permissions(ctx: &AuthContext, permissions: &[&str]) -> Result<(), AuthError> {
    if ctx.permissions.has_all(permissions) {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied)
    }
}

pub fn require_any_permission(ctx: &AuthContext, permissions: &[&str]) -> Result<(), AuthError> {
    if ctx.permissions.has_any(permissions) {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied)
    }
}

pub fn require_admin(ctx: &AuthContext) -> Result<(), AuthError> {
    if ctx.permissions.is_admin() {
        Ok(())
    } else {
        Err(AuthError::AdminRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(perms: &[(&str, bool)]) -> AuthContext {
        AuthContext {
            subject_id: SubjectId::new_v4(),
            permissions: perms.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            token_version: 0,
        }
    }

    #[test]
    fn permission_guards_map_to_their_codes() {
        let c = ctx(&[("orders.read", true), ("labels.print", false)]);

        assert!(require_permission(&c, "orders.read").is_ok());
        assert!(matches!(
            require_permission(&c, "labels.print"),
            Err(AuthError::PermissionDenied)
        ));
        assert!(matches!(
            require_permissions(&c, &["orders.read", "labels.print"]),
            Err(AuthError::PermissionDenied)
        ));
        assert!(require_any_permission(&c, &["labels.print", "orders.read"]).is_ok());
        assert!(matches!(require_admin(&c), Err(AuthError::AdminRequired)));
    }

    #[test]
    fn admin_flag_satisfies_require_admin() {
        let c = ctx(&[(ADMIN_PERMISSION, true)]);
        assert!(require_admin(&c).is_ok());
    }
}
