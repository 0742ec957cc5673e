//! Proxy/relay
//!
//! Lets a caller without signing material traverse the handshake. The caller names
//! a wallet; the relay resolves it through [`WalletCustody`], performs the call with an
//! [`X402Client`] bound to that wallet and returns the downstream result wrapped in a
//! [`RelayResponse`].
//!
//! A 402 that the relay could not get past is passed through to the caller unchanged,
//! so the caller sees the real price.

use crate::client::{PaidResponse, X402Client};
use crate::types::{headers, SettlementConfirmation};
use crate::{Result, X402Error};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub mod custody;
#[cfg(feature = "axum")]
mod handler;


pub use custody::{InMemoryCustody, RemoteCustody, RemoteSigner, WalletCustody};
#[cfg(feature = "axum")]
pub use handler::{relay_handler, router};

/// Methods the relay proxies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RelayMethod {
    pub fn as_method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }

    /// Whether a request body is meaningful for this method
    pub fn allows_body(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

impl FromStr for RelayMethod {
    type Err = X402Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            _ => Err(X402Error::unsupported_method(s)),
        }
    }
}

impl fmt::Display for RelayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_method().as_str())
    }
}

fn default_method() -> String {
    "GET".to_string()
}

/// Relay request body as sent by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelayRequest {
    pub wallet_id: String,
    /// Absolute URL, or a path joined onto the relay's base URL
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Extra headers to forward downstream
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl RelayRequest {
    pub fn new(wallet_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            endpoint: endpoint.into(),
            method: default_method(),
            data: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Turn the loosely typed body into an unambiguous [`RelayCall`]
    pub fn validate(self, base_url: Option<&Url>) -> Result<RelayCall> {
        if self.wallet_id.trim().is_empty() {
            return Err(X402Error::invalid_request("walletId must not be empty"));
        }

        let method: RelayMethod = self.method.parse()?;
        let body = match (self.data, method.allows_body()) {
            (None, _) => RelayBody::Empty,
            (Some(data), true) => RelayBody::Json(data),
            (Some(_), false) => {
                return Err(X402Error::invalid_request(format!(
                    "{} requests cannot carry data",
                    method
                )))
            }
        };

        let url = resolve_endpoint(&self.endpoint, base_url)?;

        let mut forwarded = self.headers;
        normalize_payment_headers(&mut forwarded);
        let mut header_map = HeaderMap::new();
        for (name, value) in &forwarded {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| X402Error::invalid_request(format!("invalid header name {:?}", name)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| X402Error::invalid_request(format!("invalid value for header {}", name)))?;
            header_map.insert(header_name, header_value);
        }

        Ok(RelayCall {
            wallet_id: self.wallet_id,
            method,
            url,
            body,
            headers: header_map,
        })
    }
}

fn resolve_endpoint(endpoint: &str, base_url: Option<&Url>) -> Result<Url> {
    if let Ok(url) = Url::parse(endpoint) {
        return match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(X402Error::invalid_request(format!(
                "unsupported endpoint scheme {}",
                scheme
            ))),
        };
    }

    match base_url {
        Some(base) if endpoint.starts_with('/') => base
            .join(endpoint)
            .map_err(|e| X402Error::invalid_request(format!("invalid endpoint {}: {}", endpoint, e))),
        Some(_) => Err(X402Error::invalid_request(format!(
            "relative endpoint {} must start with '/'",
            endpoint
        ))),
        None => Err(X402Error::invalid_request(format!(
            "endpoint {} is not an absolute URL and no relay base URL is configured",
            endpoint
        ))),
    }
}

/// Body of a validated call
#[derive(Debug, Clone, PartialEq)]
pub enum RelayBody {
    Empty,
    Json(Value),
}

/// A relay request that passed validation
#[derive(Debug, Clone)]
pub struct RelayCall {
    pub wallet_id: String,
    pub method: RelayMethod,
    pub url: Url,
    pub body: RelayBody,
    pub headers: HeaderMap,
}

/// Rewrite any casing of the payment header names to their canonical uppercase form
pub fn normalize_payment_headers(map: &mut BTreeMap<String, String>) {
    let renames: Vec<(String, &'static str)> = map
        .keys()
        .filter_map(|name| {
            headers::canonical_name(name)
                .filter(|canonical| *canonical != name.as_str())
                .map(|canonical| (name.clone(), canonical))
        })
        .collect();

    for (name, canonical) in renames {
        if let Some(value) = map.remove(&name) {
            map.insert(canonical.to_string(), value);
        }
    }
}

/// Downstream body, parsed as far as it goes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Structured(Value),
    RawText(String),
}

impl ResponseBody {
    /// Best-effort parse: the whole text as JSON, then the outermost `{..}` inside
    /// it, then raw text. Never fails.
    pub fn parse(text: &str) -> Self {
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            return Self::Structured(value);
        }

        if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
            if start < end {
                if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&text[start..=end]) {
                    return Self::Structured(value);
                }
            }
        }

        Self::RawText(text.to_string())
    }
}

/// What the relay hands back to its caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    /// Downstream HTTP status
    pub status: u16,
    pub data: ResponseBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_response: Option<SettlementConfirmation>,
    /// Downstream content type and payment headers, canonical names
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl RelayResponse {
    async fn from_paid(paid: PaidResponse) -> Result<Self> {
        let PaidResponse {
            response,
            settlement,
            ..
        } = paid;

        let mut forwarded = BTreeMap::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else { continue };
            if let Some(canonical) = headers::canonical_name(name.as_str()) {
                forwarded.insert(canonical.to_string(), value.to_string());
            } else if *name == CONTENT_TYPE {
                forwarded.insert(name.as_str().to_string(), value.to_string());
            }
        }

        let status = response.status().as_u16();
        let text = response.text().await?;

        Ok(Self {
            status,
            data: ResponseBody::parse(&text),
            payment_response: settlement,
            headers: forwarded,
        })
    }
}

/// Performs paid calls on behalf of wallets held by custody
#[derive(Clone)]
pub struct Relay {
    custody: Arc<dyn WalletCustody>,
    http: Client,
    base_url: Option<Url>,
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .finish()
    }
}

impl Relay {
    pub fn new(custody: impl WalletCustody + 'static) -> Result<Self> {
        Self::with_shared_custody(Arc::new(custody))
    }

    pub fn with_shared_custody(custody: Arc<dyn WalletCustody>) -> Result<Self> {
        let http = Client::builder()
            .http1_title_case_headers()
            .build()
            .map_err(|e| X402Error::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            custody,
            http,
            base_url: None,
        })
    }

    /// Base URL for relative endpoints
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url)
            .map_err(|e| X402Error::config(format!("Invalid relay base URL {}: {}", base_url, e)))?;
        self.base_url = Some(url);
        Ok(self)
    }

    /// Validate, resolve the wallet, and perform the call through the interceptor
    pub async fn execute(&self, request: RelayRequest) -> Result<RelayResponse> {
        let call = request.validate(self.base_url.as_ref())?;
        let signer = self.custody.resolve(&call.wallet_id).await?;

        tracing::debug!(
            wallet_id = %call.wallet_id,
            method = %call.method,
            url = %call.url,
            "Relaying request"
        );

        let client = X402Client::with_http_client(self.http.clone(), signer);
        let mut builder = self
            .http
            .request(call.method.as_method(), call.url)
            .headers(call.headers);
        if let RelayBody::Json(data) = &call.body {
            builder = builder.json(data);
        }

        let paid = client.execute(builder.build()?).await?;
        if let Some(settlement) = &paid.settlement {
            tracing::info!(
                wallet_id = %call.wallet_id,
                transaction = %settlement.transaction,
                "Relayed paid request"
            );
        }
        RelayResponse::from_paid(paid).await
    }
}
