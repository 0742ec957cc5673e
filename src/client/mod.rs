//! Payment interceptor
//!
//! [`X402Client`] wraps a `reqwest::Client` so that a `402 Payment Required` answer is
//! handled without the caller noticing: the challenge is parsed, the first requirement
//! the [`PaymentSigner`] can pay is signed, and the original request is sent again
//! with the proof in `X-PAYMENT`. The retry happens at most once.
//!
//! Clients built by [`X402Client::new`] send HTTP/1 header names in title case, so
//! the proof goes out on the wire as `X-Payment`. Header names are case-insensitive
//! and the responder accepts any casing.
//!
//! ```text
//! Idle → Sent → Success
//!          └──→ ChallengeReceived → Signing → Retried → Success | Failed
//! ```
//!
//! # Example
//!
//! ```no_run
//! use x402_relay::client::X402Client;
//! use x402_relay::signer::LocalSigner;
//!
//! # async fn example() -> x402_relay::Result<()> {
//! let signer = LocalSigner::new(
//!     "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
//!     "base-sepolia",
//! )?;
//! let client = X402Client::new(signer)?;
//!
//! let paid = client
//!     .post_json(
//!         "http://localhost:3000/api/summarize",
//!         &serde_json::json!({ "input": "long text..." }),
//!     )
//!     .await?;
//! if let Some(settlement) = &paid.settlement {
//!     println!("paid, transaction {}", settlement.transaction);
//! }
//! # Ok(())
//! # }
//! ```

use crate::codec;
use crate::signer::{create_payment, PaymentSigner};
use crate::types::{headers, PaymentPayload, PaymentRequirementsResponse, SettlementConfirmation};
use crate::{Result, X402Error};
use reqwest::header::HeaderValue;
use reqwest::{Client, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;


/// Where one call is in the challenge-pay-retry sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    Sent,
    ChallengeReceived,
    Signing,
    Retried,
    Success,
    Failed,
}

impl HandshakeState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: HandshakeState) -> bool {
        use HandshakeState::*;
        matches!(
            (self, next),
            (Idle, Sent)
                | (Sent, Success)
                | (Sent, ChallengeReceived)
                | (Sent, Failed)
                | (ChallengeReceived, Signing)
                | (ChallengeReceived, Failed)
                | (Signing, Retried)
                | (Signing, Failed)
                | (Retried, Success)
                | (Retried, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, HandshakeState::Success | HandshakeState::Failed)
    }
}

/// State of a single traversal, logged on every step
struct Handshake {
    url: String,
    state: HandshakeState,
}

impl Handshake {
    fn new(url: &reqwest::Url) -> Self {
        Self {
            url: url.to_string(),
            state: HandshakeState::Idle,
        }
    }

    fn advance(&mut self, next: HandshakeState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal handshake transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(url = %self.url, from = ?self.state, to = ?next, "x402 handshake");
        self.state = next;
    }

    fn fail(&mut self, error: X402Error) -> X402Error {
        self.advance(HandshakeState::Failed);
        error
    }
}

/// Final response of an intercepted call
#[derive(Debug)]
pub struct PaidResponse {
    /// Response to the original request, or to the retry if payment was needed
    pub response: Response,
    /// Decoded `X-PAYMENT-RESPONSE`, when the server attached one
    pub settlement: Option<SettlementConfirmation>,
    /// The proof that was sent, when a payment was made
    pub payment: Option<PaymentPayload>,
}

impl PaidResponse {
    /// Whether the call required a payment
    pub fn paid(&self) -> bool {
        self.payment.is_some()
    }
}

/// HTTP client that pays x402 challenges with a [`PaymentSigner`]
#[derive(Clone)]
pub struct X402Client {
    http: Client,
    signer: Arc<dyn PaymentSigner>,
}

impl std::fmt::Debug for X402Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Client")
            .field("payer", &self.signer.address())
            .field("network", &self.signer.network())
            .finish()
    }
}

impl X402Client {
    pub fn new(signer: impl PaymentSigner + 'static) -> Result<Self> {
        let http = Client::builder()
            .http1_title_case_headers()
            .build()
            .map_err(|e| X402Error::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_http_client(http, Arc::new(signer)))
    }

    /// Use an existing `reqwest::Client` and a shared signer
    pub fn with_http_client(http: Client, signer: Arc<dyn PaymentSigner>) -> Self {
        Self { http, signer }
    }

    pub fn signer(&self) -> &dyn PaymentSigner {
        self.signer.as_ref()
    }

    /// Underlying client, for building requests to pass to [`X402Client::execute`]
    pub fn http(&self) -> &Client {
        &self.http
    }

    pub async fn get(&self, url: &str) -> Result<PaidResponse> {
        let request = self.http.request(Method::GET, url).build()?;
        self.execute(request).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<PaidResponse> {
        let request = self.http.request(Method::POST, url).json(body).build()?;
        self.execute(request).await
    }

    /// Send `request`, paying and retrying once if the server answers 402
    pub async fn execute(&self, request: Request) -> Result<PaidResponse> {
        let mut handshake = Handshake::new(request.url());
        let mut retry = request.try_clone().ok_or_else(|| {
            X402Error::invalid_request("request body is a stream and cannot be resent")
        })?;

        handshake.advance(HandshakeState::Sent);
        let response = match self.http.execute(request).await {
            Ok(response) => response,
            Err(e) => return Err(handshake.fail(e.into())),
        };

        if response.status() != StatusCode::PAYMENT_REQUIRED {
            handshake.advance(HandshakeState::Success);
            return Ok(PaidResponse {
                settlement: settlement_from(&response),
                response,
                payment: None,
            });
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Err(handshake.fail(e.into())),
        };
        let challenge = match parse_challenge(&body) {
            Ok(challenge) => challenge,
            Err(e) => return Err(handshake.fail(e)),
        };
        handshake.advance(HandshakeState::ChallengeReceived);

        let Some(requirements) = challenge
            .accepts
            .iter()
            .find(|requirements| self.signer.supports(requirements))
        else {
            let offered: Vec<_> = challenge
                .accepts
                .iter()
                .map(|r| format!("{}/{}", r.scheme, r.network))
                .collect();
            return Err(handshake.fail(X402Error::NoMatchingRequirement {
                message: format!(
                    "signer pays on {}, server accepts {}",
                    self.signer.network(),
                    offered.join(", ")
                ),
                body,
            }));
        };

        handshake.advance(HandshakeState::Signing);
        let now = chrono::Utc::now().timestamp();
        let payment = match self.sign(requirements, now, &mut retry).await {
            Ok(payment) => payment,
            Err(e) => return Err(handshake.fail(e)),
        };

        handshake.advance(HandshakeState::Retried);
        let response = match self.http.execute(retry).await {
            Ok(response) => response,
            Err(e) => return Err(handshake.fail(e.into())),
        };

        if response.status() == StatusCode::PAYMENT_REQUIRED {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<PaymentRequirementsResponse>(&body)
                .map(|rejection| rejection.error)
                .unwrap_or_else(|_| "payment rejected".to_string());
            tracing::warn!(resource = %requirements.resource, reason = %reason, "Payment proof rejected by server");
            return Err(handshake.fail(X402Error::PaymentRejected { reason, body }));
        }

        handshake.advance(HandshakeState::Success);
        Ok(PaidResponse {
            settlement: settlement_from(&response),
            response,
            payment: Some(payment),
        })
    }

    /// Sign a proof for `requirements` and attach it to `retry`
    async fn sign(
        &self,
        requirements: &crate::types::PaymentRequirements,
        now: i64,
        retry: &mut Request,
    ) -> Result<PaymentPayload> {
        let payment = create_payment(self.signer.as_ref(), requirements, now).await?;
        let encoded = codec::encode_payment(&payment)?;
        let value = HeaderValue::from_str(&encoded)
            .map_err(|_| X402Error::malformed_proof("encoded proof is not a valid header value"))?;
        retry.headers_mut().insert(headers::X_PAYMENT, value);

        // The server rejects the proof once validBefore passes.
        let remaining = payment.payload.authorization.valid_before_secs()? - now;
        *retry.timeout_mut() = Some(Duration::from_secs(remaining.max(1) as u64));

        Ok(payment)
    }
}

fn parse_challenge(body: &str) -> Result<PaymentRequirementsResponse> {
    let challenge: PaymentRequirementsResponse =
        serde_json::from_str(body).map_err(|e| X402Error::InvalidChallenge {
            message: e.to_string(),
            body: body.to_string(),
        })?;
    if challenge.accepts.is_empty() {
        return Err(X402Error::InvalidChallenge {
            message: "accepts is empty".to_string(),
            body: body.to_string(),
        });
    }
    Ok(challenge)
}

/// Decode `X-PAYMENT-RESPONSE` if present; an undecodable header is logged and dropped
pub fn settlement_from(response: &Response) -> Option<SettlementConfirmation> {
    let value = response
        .headers()
        .get(headers::X_PAYMENT_RESPONSE)?
        .to_str()
        .ok()?;
    match codec::decode_settlement(value) {
        Ok(settlement) => Some(settlement),
        Err(e) => {
            tracing::warn!(error = %e, "Undecodable X-PAYMENT-RESPONSE header");
            None
        }
    }
}
