//! Dashboard backend HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::proof::Nonce;

const NONCE_PATH: &str = "/api/auth/request_nonce";
const VERIFY_SIGNATURE_PATH: &str = "/api/auth/verify_signature";
const VERIFY_TON_CONNECT_PATH: &str = "/api/auth/verify_ton_connect";

/// Body of both verification endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Raw `wc:hex` form.
    pub address: String,
    /// Hex-encoded Ed25519 public key.
    pub public_key: String,
    pub nonce: String,
    /// Base64 signature.
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Deserialize)]
struct NonceResponse {
    nonce: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Authentication endpoints of the dashboard backend.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `GET /api/auth/request_nonce`
    async fn request_nonce(&self) -> Result<Nonce, ApiError>;

    /// `POST /api/auth/verify_signature`, returning the access token.
    async fn verify_signature(&self, request: &VerifyRequest) -> Result<String, ApiError>;

    /// `POST /api/auth/verify_ton_connect`, returning the access token.
    async fn verify_ton_connect(&self, request: &VerifyRequest) -> Result<String, ApiError>;

    /// Authenticated `GET` of any other endpoint.
    async fn get(&self, path: &str, token: &str) -> Result<Value, ApiError>;

    /// Authenticated `POST` of a JSON body to any other endpoint.
    async fn post(&self, path: &str, token: &str, body: &Value) -> Result<Value, ApiError>;
}

/// [`AuthApi`] over reqwest.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    base_url: String,
    http: Client,
}

impl HttpAuthApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_verify(&self, path: &str, request: &VerifyRequest) -> Result<String, ApiError> {
        debug!(path, address = %request.address, "Submitting proof for verification");
        let response = self.http.post(self.url(path)).json(request).send().await?;
        let body: TokenResponse = checked(response).await?.json().await?;
        if body.access_token.is_empty() {
            return Err(ApiError::InvalidResponse("empty access_token".into()));
        }
        Ok(body.access_token)
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn request_nonce(&self) -> Result<Nonce, ApiError> {
        let response = self.http.get(self.url(NONCE_PATH)).send().await?;
        let body: NonceResponse = checked(response).await?.json().await?;
        Nonce::new(body.nonce).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn verify_signature(&self, request: &VerifyRequest) -> Result<String, ApiError> {
        self.post_verify(VERIFY_SIGNATURE_PATH, request).await
    }

    async fn verify_ton_connect(&self, request: &VerifyRequest) -> Result<String, ApiError> {
        self.post_verify(VERIFY_TON_CONNECT_PATH, request).await
    }

    async fn get(&self, path: &str, token: &str) -> Result<Value, ApiError> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }
    async fn post(&self, path: &str, token: &str, body: &Value) -> Result<Value, ApiError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Ok(checked(response).await?.json().await?)
    }
}

/// Turn a non-2xx response into [`ApiError::Status`], keeping the `detail`.
async fn checked(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = error_detail(&body);
    warn!(status = status.as_u16(), ?detail, "Backend returned an error");
    Err(ApiError::Status {
        status: status.as_u16(),
        detail,
    })
}

fn error_detail(body: &str) -> Option<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(detail)) => Some(detail.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        },
        _ => {
            let text = body.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
    }
}
