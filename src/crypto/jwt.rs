//! JWT bearer tokens for Coinbase CDP style service authentication
//!
//! Both the hosted facilitator and the wallet-custody service authenticate each call
//! with a short-lived token scoped to one `METHOD host/path`.

use crate::{Result, X402Error};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::env;

/// Token lifetime in seconds
const TOKEN_TTL_SECS: i64 = 120;

#[derive(Debug, Serialize)]
struct Claims {
    iss: String,
    sub: String,
    aud: Vec<String>,
    nbf: i64,
    exp: i64,
    uri: String,
    jti: String,
}

/// API key pair used to mint bearer tokens
#[derive(Clone)]
pub struct CdpCredentials {
    pub key_id: String,
    key_secret: String,
}

impl std::fmt::Debug for CdpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpCredentials")
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .finish()
    }
}

impl CdpCredentials {
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }

    pub fn key_secret(&self) -> &str {
        &self.key_secret
    }

    /// Read `CDP_API_KEY_ID` / `CDP_API_KEY_SECRET`; `None` when either is unset
    pub fn from_env() -> Option<Self> {
        let id = env::var("CDP_API_KEY_ID").ok().filter(|v| !v.is_empty())?;
        let secret = env::var("CDP_API_KEY_SECRET")
            .ok()
            .filter(|v| !v.is_empty())?;
        Some(Self::new(id, secret))
    }

    /// Mint a signed token for one request
    pub fn generate_jwt(&self, method: &str, host: &str, path: &str) -> Result<String> {
        if self.key_id.is_empty() || self.key_secret.is_empty() {
            return Err(X402Error::config(
                "Missing credentials: CDP_API_KEY_ID and CDP_API_KEY_SECRET must be set",
            ));
        }

        let host = host
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        let now = chrono::Utc::now().timestamp();

        let claims = Claims {
            iss: "cdp".to_string(),
            sub: self.key_id.clone(),
            aud: vec!["cdp_service".to_string()],
            nbf: now,
            exp: now + TOKEN_TTL_SECS,
            uri: format!("{} {}{}", method.to_uppercase(), host, path),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.key_id.clone());
        let key = EncodingKey::from_secret(self.key_secret.as_bytes());

        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| X402Error::config(format!("JWT encoding failed: {}", e)))
    }

    /// `Authorization` header value for one request
    pub fn bearer(&self, method: &str, host: &str, path: &str) -> Result<String> {
        Ok(format!("Bearer {}", self.generate_jwt(method, host, path)?))
    }
}
