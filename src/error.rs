//! Error types for the x402 handshake
//!
//! Every failure in the protocol core is an [`X402Error`]. Each variant knows the HTTP
//! status it maps to ([`X402Error::status_code`]) and a stable machine-readable code
//! ([`X402Error::error_code`]) so callers can branch without parsing messages.

use http::StatusCode;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, X402Error>;

/// Errors produced by the challenge responder, interceptor, facilitator and relay
#[derive(Debug, Error)]
pub enum X402Error {
    /// The request reached a priced route without a payment proof
    #[error("X-PAYMENT header is required")]
    NoProofSupplied,

    /// The payment header was present but could not be decoded
    #[error("Malformed payment proof: {message}")]
    MalformedProof { message: String },

    /// The facilitator refused the proof
    #[error("Payment proof rejected: {reason}")]
    ProofRejected {
        reason: String,
        payer: Option<String>,
    },

    /// The facilitator could not be reached (connect failure, timeout, 5xx)
    #[error("Facilitator unavailable: {message}")]
    FacilitatorUnavailable { message: String },

    /// The facilitator answered with something that is not a usable response
    #[error("Facilitator error: {message}")]
    FacilitatorError { message: String },

    /// The resource server answered the retried request with another 402
    #[error("Payment rejected: {reason}")]
    PaymentRejected { reason: String, body: String },

    /// None of the offered payment requirements can be paid by the signer
    #[error("No acceptable payment requirement: {message}")]
    NoMatchingRequirement { message: String, body: String },

    /// A 402 arrived without a well-formed `accepts` list
    #[error("Invalid payment challenge: {message}")]
    InvalidChallenge { message: String, body: String },

    /// Transport failure talking to the resource server
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The relay could not resolve a wallet to a signer
    #[error("Wallet not found: {wallet_id}")]
    WalletNotFound { wallet_id: String },

    /// The wallet-custody service could not be reached or answered 5xx
    #[error("Custody service unavailable: {message}")]
    CustodyUnavailable { message: String },

    /// The wallet-custody service answered with something unusable
    #[error("Custody service error: {message}")]
    CustodyError { message: String },

    /// The relay does not proxy this HTTP method
    #[error("Unsupported method: {method}")]
    UnsupportedMethod { method: String },

    /// The inbound request is ambiguous or incomplete
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Invalid signature: {message}")]
    InvalidSignature { message: String },

    #[error("Invalid authorization: {message}")]
    InvalidAuthorization { message: String },

    #[error("Invalid payment requirements: {message}")]
    InvalidPaymentRequirements { message: String },

    #[error("Network not supported: {network}")]
    NetworkNotSupported { network: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl X402Error {
    pub fn malformed_proof(message: impl Into<String>) -> Self {
        Self::MalformedProof {
            message: message.into(),
        }
    }

    pub fn proof_rejected(reason: impl Into<String>, payer: Option<String>) -> Self {
        Self::ProofRejected {
            reason: reason.into(),
            payer,
        }
    }

    pub fn facilitator_unavailable(message: impl Into<String>) -> Self {
        Self::FacilitatorUnavailable {
            message: message.into(),
        }
    }

    pub fn facilitator_error(message: impl Into<String>) -> Self {
        Self::FacilitatorError {
            message: message.into(),
        }
    }

    pub fn wallet_not_found(wallet_id: impl Into<String>) -> Self {
        Self::WalletNotFound {
            wallet_id: wallet_id.into(),
        }
    }

    pub fn custody_unavailable(message: impl Into<String>) -> Self {
        Self::CustodyUnavailable {
            message: message.into(),
        }
    }

    pub fn custody_error(message: impl Into<String>) -> Self {
        Self::CustodyError {
            message: message.into(),
        }
    }

    pub fn unsupported_method(method: impl Into<String>) -> Self {
        Self::UnsupportedMethod {
            method: method.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::InvalidSignature {
            message: message.into(),
        }
    }

    pub fn invalid_authorization(message: impl Into<String>) -> Self {
        Self::InvalidAuthorization {
            message: message.into(),
        }
    }

    pub fn invalid_payment_requirements(message: impl Into<String>) -> Self {
        Self::InvalidPaymentRequirements {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// HTTP status this error maps to when it crosses an HTTP boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoProofSupplied
            | Self::MalformedProof { .. }
            | Self::ProofRejected { .. }
            | Self::PaymentRejected { .. }
            | Self::NoMatchingRequirement { .. }
            | Self::InvalidChallenge { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::FacilitatorUnavailable { .. } | Self::CustodyUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::FacilitatorError { .. } | Self::CustodyError { .. } | Self::Network(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::WalletNotFound { .. } => StatusCode::NOT_FOUND,
            Self::UnsupportedMethod { .. } | Self::InvalidRequest { .. } => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable snake_case identifier for programmatic branching
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoProofSupplied => "no_proof_supplied",
            Self::MalformedProof { .. } => "malformed_proof",
            Self::ProofRejected { .. } => "proof_rejected",
            Self::FacilitatorUnavailable { .. } => "facilitator_unavailable",
            Self::FacilitatorError { .. } => "facilitator_error",
            Self::PaymentRejected { .. } => "payment_rejected",
            Self::NoMatchingRequirement { .. } => "no_matching_requirement",
            Self::InvalidChallenge { .. } => "invalid_challenge",
            Self::Network(_) => "network_error",
            Self::WalletNotFound { .. } => "wallet_not_found",
            Self::CustodyUnavailable { .. } => "custody_unavailable",
            Self::CustodyError { .. } => "custody_error",
            Self::UnsupportedMethod { .. } => "unsupported_method",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidSignature { .. } => "invalid_signature",
            Self::InvalidAuthorization { .. } => "invalid_authorization",
            Self::InvalidPaymentRequirements { .. } => "invalid_payment_requirements",
            Self::NetworkNotSupported { .. } => "network_not_supported",
            Self::Config { .. } => "config_error",
            Self::Storage { .. } => "storage_error",
            Self::Serialization(_) => "serialization_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Whether repeating the failed operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::FacilitatorUnavailable { .. } | Self::CustodyUnavailable { .. } => true,
            Self::Network(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    /// Raw downstream 402 body carried by client-side payment failures
    pub fn challenge_body(&self) -> Option<&str> {
        match self {
            Self::PaymentRejected { body, .. }
            | Self::NoMatchingRequirement { body, .. }
            | Self::InvalidChallenge { body, .. } => Some(body),
            _ => None,
        }
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for X402Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();

        // The caller needs the real price, so downstream challenges pass through untouched.
        if let Some(body) = self.challenge_body() {
            let content_type = if serde_json::from_str::<serde_json::Value>(body).is_ok() {
                "application/json"
            } else {
                "text/plain; charset=utf-8"
            };
            return (
                status,
                [(http::header::CONTENT_TYPE, content_type)],
                body.to_string(),
            )
                .into_response();
        }

        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "code": self.error_code(),
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_map_to_402() {
        assert_eq!(
            X402Error::NoProofSupplied.status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            X402Error::malformed_proof("bad base64").status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            X402Error::proof_rejected("authorization_expired", None).status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
    }

    #[test]
    fn test_facilitator_outage_is_not_402() {
        let err = X402Error::facilitator_unavailable("connection refused");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), "facilitator_unavailable");
        assert!(err.is_retryable());

        let err = X402Error::facilitator_error("unexpected body");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_relay_error_mapping() {
        let err = X402Error::wallet_not_found("w-123");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Wallet not found: w-123");

        let err = X402Error::unsupported_method("TRACE");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "unsupported_method");
    }

    #[test]
    fn test_challenge_body_only_on_client_side_402s() {
        let err = X402Error::PaymentRejected {
            reason: "invalid_signature".to_string(),
            body: "{\"x402Version\":1}".to_string(),
        };
        assert_eq!(err.challenge_body(), Some("{\"x402Version\":1}"));
        assert!(X402Error::NoProofSupplied.challenge_body().is_none());
    }

    #[cfg(feature = "axum")]
    #[test]
    fn test_passed_through_challenge_keeps_its_content_type() {
        use axum::response::IntoResponse;

        let content_type = |err: X402Error| {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
            response.headers()[http::header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .to_string()
        };

        let json = X402Error::PaymentRejected {
            reason: "invalid_signature".to_string(),
            body: "{\"x402Version\":1,\"accepts\":[]}".to_string(),
        };
        assert_eq!(content_type(json), "application/json");

        let html = X402Error::InvalidChallenge {
            message: "challenge is not JSON".to_string(),
            body: "<html>pay up</html>".to_string(),
        };
        assert_eq!(content_type(html), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_unexpected_errors_are_500_with_code() {
        let err = X402Error::config("missing pay_to");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "config_error");
    }
}
