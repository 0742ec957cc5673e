//! Facilitators verify and settle payment proofs
//!
//! The challenge responder never judges a proof itself. It asks a [`Facilitator`]:
//!
//! - [`FacilitatorClient`] - a remote facilitator service reached over HTTP
//! - [`coinbase`] - configuration preset for the Coinbase CDP facilitator
//! - [`local::LocalFacilitator`] - an in-process facilitator that checks proofs and
//!   keeps a replay ledger, also served over HTTP by the `x402-facilitator` binary
//!
//! Transport failures are reported as [`X402Error::FacilitatorUnavailable`] and are
//! never turned into a verdict about the proof.
//!
//! # Example
//!
//! ```no_run
//! use x402_relay::facilitator::{Facilitator, FacilitatorClient};
//! use x402_relay::types::{FacilitatorConfig, PaymentPayload, PaymentRequirements};
//!
//! # async fn example(payload: PaymentPayload, requirements: PaymentRequirements) -> x402_relay::Result<()> {
//! let client = FacilitatorClient::new(FacilitatorConfig::new("http://localhost:4020"))?;
//!
//! let verdict = client.verify(&payload, &requirements).await?;
//! if verdict.is_valid {
//!     let receipt = client.settle(&payload, &requirements).await?;
//!     println!("settled: {}", receipt.transaction);
//! }
//! # Ok(())
//! # }
//! ```

use crate::types::{
    AuthHeadersFnArc, FacilitatorConfig, FacilitatorRequest, PaymentPayload, PaymentRequirements,
    SettlementConfirmation, SupportedKinds, VerifyResponse,
};
use crate::{Result, X402Error};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

pub mod coinbase;
pub mod local;

#[cfg(test)]
mod tests;

/// Default facilitator URL
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

/// Verification and settlement of payment proofs
#[async_trait]
pub trait Facilitator: Send + Sync {
    /// Check a proof against a requirement without moving funds
    async fn verify(
        &self,
        payment_payload: &PaymentPayload,
        payment_requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse>;

    /// Execute a previously verified proof
    async fn settle(
        &self,
        payment_payload: &PaymentPayload,
        payment_requirements: &PaymentRequirements,
    ) -> Result<SettlementConfirmation>;

    /// Schemes and networks this facilitator handles
    async fn supported(&self) -> Result<SupportedKinds>;
}

/// HTTP client for a remote facilitator service
#[derive(Clone)]
pub struct FacilitatorClient {
    url: String,
    client: Client,
    auth_config: Option<AuthHeadersFnArc>,
}

impl std::fmt::Debug for FacilitatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorClient")
            .field("url", &self.url)
            .field("auth_config", &"<function>")
            .finish()
    }
}

impl FacilitatorClient {
    pub fn new(config: FacilitatorConfig) -> Result<Self> {
        config.validate()?;

        let mut client_builder = Client::builder();
        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder
            .build()
            .map_err(|e| X402Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: config.url,
            client,
            auth_config: config.create_auth_headers,
        })
    }

    /// Base URL of this facilitator
    pub fn url(&self) -> &str {
        &self.url
    }

    fn with_auth(&self, mut request: RequestBuilder, endpoint: &str) -> Result<RequestBuilder> {
        if let Some(auth_config) = &self.auth_config {
            let headers = auth_config()?;
            if let Some(endpoint_headers) = headers.get(endpoint) {
                for (key, value) in endpoint_headers {
                    request = request.header(key, value);
                }
            }
        }
        Ok(request)
    }

    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<Response> {
        let request = self.with_auth(request, endpoint)?;
        let response = request.send().await.map_err(|e| {
            tracing::error!(endpoint, error = %e, "Facilitator unreachable");
            X402Error::facilitator_unavailable(format!("{} request failed: {}", endpoint, e))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        tracing::error!(endpoint, %status, body = %body, "Facilitator request failed");

        if status.is_server_error() {
            Err(X402Error::facilitator_unavailable(format!(
                "{} failed with status {}",
                endpoint, status
            )))
        } else {
            Err(X402Error::facilitator_error(format!(
                "{} failed with status {}: {}",
                endpoint, status, body
            )))
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T> {
        let body = response.text().await.map_err(|e| {
            X402Error::facilitator_unavailable(format!("{} response unreadable: {}", endpoint, e))
        })?;
        tracing::debug!(endpoint, body = %body, "Facilitator response");
        serde_json::from_str(&body).map_err(|e| {
            X402Error::facilitator_error(format!("{} returned an invalid body: {}", endpoint, e))
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        payment_payload: &PaymentPayload,
        payment_requirements: &PaymentRequirements,
    ) -> Result<T> {
        let body = FacilitatorRequest::new(payment_payload, payment_requirements);
        let request = self
            .client
            .post(format!("{}/{}", self.url, endpoint))
            .json(&body);
        let response = self.send(request, endpoint).await?;
        Self::read_json(response, endpoint).await
    }
}

#[async_trait]
impl Facilitator for FacilitatorClient {
    async fn verify(
        &self,
        payment_payload: &PaymentPayload,
        payment_requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse> {
        self.post("verify", payment_payload, payment_requirements)
            .await
    }

    async fn settle(
        &self,
        payment_payload: &PaymentPayload,
        payment_requirements: &PaymentRequirements,
    ) -> Result<SettlementConfirmation> {
        self.post("settle", payment_payload, payment_requirements)
            .await
    }

    async fn supported(&self) -> Result<SupportedKinds> {
        let request = self.client.get(format!("{}/supported", self.url));
        let response = self.send(request, "supported").await?;
        Self::read_json(response, "supported").await
    }
}
