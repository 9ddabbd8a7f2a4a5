use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::time::Duration;

const ACCESS_TYP: &str = "access";
const REFRESH_TYP: &str = "refresh";

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessTokenClaims {
    sub: String,
    perms: Permissions,
    ver: i64,
    typ: String,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshTokenClaims {
    sub: String,
    typ: String,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String, // distinguishes refresh tokens minted within the same second
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtHs256Codec { cfg }
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    #[inline]
    fn parse_subject(sub: &str) -> Result<SubjectId, AuthError> {
        sub.parse::<SubjectId>()
            .map_err(|_| AuthError::InvalidOrExpired)
    }

    #[inline]
    fn parse_exp(exp: i64) -> Result<DateTime<Utc>, AuthError> {
        DateTime::<Utc>::from_timestamp(exp, 0).ok_or(AuthError::InvalidOrExpired)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(&self.cfg.signing_key),
        )
        .map_err(|e| AuthError::InternalError(e.to_string()))
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, AuthError> {
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = true;
        v.leeway = 0;
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        let data = decode::<T>(token, &DecodingKey::from_secret(&self.cfg.signing_key), &v)
            .map_err(|_| AuthError::InvalidOrExpired)?;
        Ok(data.claims)
    }
}

impl TokenCodec for JwtHs256Codec {
    fn mint_access(
        &self,
        subject: SubjectId,
        permissions: &Permissions,
        token_version: i64,
        ttl: Duration,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let iat_dt = Utc::now();
        let exp_dt = iat_dt + ttl;
        let claims = AccessTokenClaims {
            sub: subject.to_string(),
            perms: permissions.clone(),
            ver: token_version,
            typ: ACCESS_TYP.to_string(),
            exp: exp_dt.timestamp(),
            iat: iat_dt.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            jti: Self::gen_jti(),
        };
        let token = self.sign(&claims)?;
        Ok((AccessToken(token), Self::parse_exp(claims.exp)?))
    }

    fn mint_refresh(
        &self,
        subject: SubjectId,
        ttl: Duration,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError> {
        let iat_dt = Utc::now();
        let exp_dt = iat_dt + ttl;
        let claims = RefreshTokenClaims {
            sub: subject.to_string(),
            typ: REFRESH_TYP.to_string(),
            exp: exp_dt.timestamp(),
            iat: iat_dt.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            jti: Self::gen_jti(),
        };
        let token = self.sign(&claims)?;
        Ok((RefreshToken(token), Self::parse_exp(claims.exp)?))
    }

    fn decode_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let claims: AccessTokenClaims = self.verify(token)?;
        if claims.typ != ACCESS_TYP {
            return Err(AuthError::InvalidOrExpired);
        }
        Ok(AccessClaims {
            subject_id: Self::parse_subject(&claims.sub)?,
            permissions: claims.perms,
            token_version: claims.ver,
            expires_at: Self::parse_exp(claims.exp)?,
        })
    }

    fn decode_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        let claims: RefreshTokenClaims = self.verify(token)?;
        if claims.typ != REFRESH_TYP {
            return Err(AuthError::InvalidOrExpired);
        }
        Ok(RefreshClaims {
            subject_id: Self::parse_subject(&claims.sub)?,
            jti: claims.jti,
            expires_at: Self::parse_exp(claims.exp)?,
        })
    }
}

#[derive(Deserialize)]
struct ExpiryOnly {
    exp: i64,
}

/// Reads `exp` without checking the signature.
///
/// Client-side freshness hint only; the server stays authoritative. Returns
/// `None` for anything that does not parse as a JWT with a numeric `exp`.
pub fn peek_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut v = Validation::new(Algorithm::HS256);
    v.insecure_disable_signature_validation();
    v.validate_exp = false;
    v.validate_aud = false;
    v.required_spec_claims.clear();
    let data = decode::<ExpiryOnly>(token, &DecodingKey::from_secret(&[]), &v).ok()?;
    DateTime::<Utc>::from_timestamp(data.claims.exp, 0)
}
