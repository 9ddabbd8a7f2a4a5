use crate::application_impl::peek_expiry;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A credential is stale once `now` reaches `expiresAt - buffer`.
///
/// Undecodable credentials are always stale.
pub fn is_stale(token: &str, buffer: Duration, now: DateTime<Utc>) -> bool {
    match peek_expiry(token) {
        Some(expires_at) => now >= expires_at - buffer,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{JwtConfig, JwtHs256Codec};
    use crate::application_port::TokenCodec;
    use crate::domain_model::*;

    fn mint(ttl: Duration) -> String {
        let codec = JwtHs256Codec::new(JwtConfig {
            issuer: "iss".into(),
            audience: "aud".into(),
            signing_key: b"k".to_vec(),
        });
        codec
            .mint_access(SubjectId::new_v4(), &Permissions::default(), 0, ttl)
            .unwrap()
            .0
            .0
    }

    #[test]
    fn buffer_window_counts_as_stale() {
        let buffer = Duration::from_secs(300);
        let now = Utc::now();

        assert!(!is_stale(&mint(Duration::from_secs(900)), buffer, now));
        assert!(is_stale(&mint(Duration::from_secs(240)), buffer, now));
        assert!(is_stale(&mint(Duration::ZERO), buffer, now));
        assert!(is_stale("opaque", buffer, now));
    }
}
