use crate::domain_model::{Permissions, SubjectStatus};
use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub otp: Otp,
    pub storage: Storage,
    pub http: Http,
    pub log: Log,
    #[serde(default)]
    pub dev_subjects: Vec<DevSubject>,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub issuer: String,
    pub audience: String,
    /// Overridden by `JWT_SIGNING_KEY` when set.
    #[serde(default)]
    pub signing_key: Option<String>,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub refresh_keep: usize,
    pub refresh_retention_secs: u64,
    pub max_failed_logins: u32,
    pub lockout_secs: u64,
    pub min_password_len: usize,
    #[serde(default)]
    pub maintenance: bool,
}

#[derive(Debug, Deserialize)]
pub struct Otp {
    pub backend: String, // "memory" or "redis"
    pub ttl_secs: u64,
    pub max_attempts: u32,
    /// Overridden by `OTP_HMAC_KEY` when set.
    #[serde(default)]
    pub hmac_key: Option<String>,
    #[serde(default)]
    pub redis_url: Option<String>,
    pub key_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub backend: String, // "memory" or "mysql"
    #[serde(default)]
    pub mysql_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub cert_path: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
    pub cookie_secure: bool,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

/// Account seeded into the memory backend at startup.
#[derive(Debug, Deserialize)]
pub struct DevSubject {
    pub email: String,
    pub password: String,
    #[serde(default = "default_status")]
    pub status: SubjectStatus,
    #[serde(default)]
    pub permissions: Permissions,
}

fn default_status() -> SubjectStatus {
    SubjectStatus::Active
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn dev_settings_parse() {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(
                include_str!("../../settings/dev.toml"),
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.storage.backend, "memory");
        assert_eq!(settings.auth.refresh_keep, 2);
        assert!(!settings.dev_subjects.is_empty());
        assert!(settings.dev_subjects[0].permissions.is_admin());
    }
}
