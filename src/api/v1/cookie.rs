use std::time::Duration;

pub const REFRESH_COOKIE: &str = "refresh_token";

/// Attributes of the refresh-credential cookie.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    /// Off only for plain-HTTP local runs.
    pub secure: bool,
    pub max_age: Duration,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        CookiePolicy {
            secure: true,
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl CookiePolicy {
    pub fn issue(&self, token: &str) -> String {
        self.render(token, self.max_age.as_secs())
    }

    pub fn expire(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: u64) -> String {
        let secure = if self.secure { " Secure;" } else { "" };
        format!("{REFRESH_COOKIE}={value}; HttpOnly;{secure} SameSite=Strict; Path=/; Max-Age={max_age}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_cookie_is_locked_down() {
        let cookie = CookiePolicy::default().issue("abc");
        assert_eq!(
            cookie,
            "refresh_token=abc; HttpOnly; Secure; SameSite=Strict; Path=/; Max-Age=604800"
        );
    }

    #[test]
    fn expired_cookie_clears_value() {
        let policy = CookiePolicy {
            secure: false,
            ..Default::default()
        };
        assert_eq!(
            policy.expire(),
            "refresh_token=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0"
        );
    }
}
