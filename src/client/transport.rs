use super::{RefreshError, TransportError};
use crate::domain_model::ErrorCode;
use serde_json::{Value, json};

pub const LOGIN_PATH: &str = "login";
pub const VERIFY_OTP_PATH: &str = "verify-otp";
pub const RESEND_OTP_PATH: &str = "resend-otp";
pub const REFRESH_PATH: &str = "refresh-token";
pub const LOGOUT_PATH: &str = "logout";

const AUTH_ENDPOINTS: [&str; 5] = [
    LOGIN_PATH,
    VERIFY_OTP_PATH,
    RESEND_OTP_PATH,
    REFRESH_PATH,
    LOGOUT_PATH,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// A call relative to the API base, e.g. `me` or `admin/subjects/{id}/sessions`.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl OutboundRequest {
    pub fn get(path: impl Into<String>) -> Self {
        OutboundRequest {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        OutboundRequest {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        OutboundRequest {
            method: Method::Put,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        OutboundRequest {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }

    fn endpoint(&self) -> &str {
        let path = self.path.trim_start_matches('/');
        path.split(['?', '#']).next().unwrap_or(path)
    }

    /// Issuer endpoints bypass refresh and retry handling.
    pub fn is_auth_endpoint(&self) -> bool {
        AUTH_ENDPOINTS.contains(&self.endpoint())
    }

    pub fn is_endpoint(&self, endpoint: &str) -> bool {
        self.endpoint() == endpoint
    }
}

#[derive(Debug, Clone)]
pub struct InboundResponse {
    pub status: u16,
    pub body: Value,
}

impl InboundResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_auth_failure(&self) -> bool {
        self.status == 401 || self.status == 403
    }

    /// `None` when the body carries no `code` field.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.body
            .get("code")
            .and_then(|c| serde_json::from_value(c.clone()).ok())
    }

    pub fn access_token(&self) -> Option<&str> {
        self.body.get("accessToken").and_then(Value::as_str)
    }
}

#[async_trait::async_trait]
pub trait ApiTransport: Send + Sync {
    async fn execute(
        &self,
        request: &OutboundRequest,
        bearer: Option<&str>,
    ) -> Result<InboundResponse, TransportError>;

    /// Calls the refresh endpoint. The refresh credential travels in the
    /// transport's cookie jar, never as an argument.
    async fn refresh(&self) -> Result<String, RefreshError>;
}

/// HTTP transport with a cookie store holding the refresh credential.
pub struct ReqwestTransport {
    http: reqwest::Client,
    base: reqwest::Url,
}

impl ReqwestTransport {
    /// `base_url` is the API root, e.g. `https://host/api/v1`.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let mut base =
            reqwest::Url::parse(base_url).map_err(|e| TransportError::Connect(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(ReqwestTransport { http, base })
    }

    fn url(&self, path: &str) -> Result<reqwest::Url, TransportError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::Connect(e.to_string()))
    }
}

#[async_trait::async_trait]
impl ApiTransport for ReqwestTransport {
    async fn execute(
        &self,
        request: &OutboundRequest,
        bearer: Option<&str>,
    ) -> Result<InboundResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.http.request(method, self.url(&request.path)?);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let status = resp.status().as_u16();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))?
        };

        Ok(InboundResponse { status, body })
    }

    async fn refresh(&self) -> Result<String, RefreshError> {
        let resp = self
            .execute(&OutboundRequest::post(REFRESH_PATH, json!({})), None)
            .await
            .map_err(RefreshError::Transport)?;

        if !resp.is_success() {
            return Err(RefreshError::Rejected {
                status: resp.status,
                code: resp.error_code(),
            });
        }

        resp.access_token().map(str::to_string).ok_or_else(|| {
            RefreshError::Transport(TransportError::Decode(
                "refresh response without accessToken".to_string(),
            ))
        })
    }
}
