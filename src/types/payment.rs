//! Payment-related types

use super::constants::DEFAULT_MAX_TIMEOUT_SECONDS;
use super::network::NetworkConfig;
use crate::{Result, X402Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// x402 protocol version
pub const X402_VERSION: u32 = 1;

/// One acceptable way of paying for a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequirements {
    /// Payment scheme identifier (e.g., "exact")
    pub scheme: String,
    /// Settlement network identifier (e.g., "base-sepolia")
    pub network: String,
    /// Required payment amount in the asset's smallest unit
    #[serde(rename = "maxAmountRequired")]
    pub max_amount_required: String,
    /// Absolute URL of the protected resource
    pub resource: String,
    /// Human-readable description of the resource
    pub description: String,
    /// MIME type of the expected response
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Recipient address for the payment
    #[serde(rename = "payTo")]
    pub pay_to: String,
    /// How long a proof stays valid after it is issued
    #[serde(rename = "maxTimeoutSeconds")]
    pub max_timeout_seconds: u32,
    /// Token contract address
    pub asset: String,
    /// JSON schema describing the response format
    #[serde(rename = "outputSchema", default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    /// Scheme-specific parameters (EIP-712 domain name and version for `exact`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl PaymentRequirements {
    /// Create a new payment requirements instance
    pub fn new(
        scheme: impl Into<String>,
        network: impl Into<String>,
        max_amount_required: impl Into<String>,
        asset: impl Into<String>,
        pay_to: impl Into<String>,
        resource: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            network: network.into(),
            max_amount_required: max_amount_required.into(),
            resource: resource.into(),
            description: description.into(),
            mime_type: "application/json".to_string(),
            pay_to: pay_to.into(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            asset: asset.into(),
            output_schema: None,
            extra: None,
        }
    }

    /// Set USDC domain information in the extra field
    pub fn set_usdc_info(&mut self, network: &NetworkConfig) {
        self.extra = Some(serde_json::json!({
            "name": network.usdc_name,
            "version": "2",
        }));
    }

    /// A string field of `extra`, if present
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.as_ref()?.get(key)?.as_str()
    }
}

/// Payment proof attached to a retried request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPayload {
    /// Protocol version identifier
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    /// Payment scheme identifier
    pub scheme: String,
    /// Settlement network identifier
    pub network: String,
    /// Signed scheme payload
    pub payload: ExactEvmPayload,
}

impl PaymentPayload {
    /// Create a new payment payload
    pub fn new(
        scheme: impl Into<String>,
        network: impl Into<String>,
        payload: ExactEvmPayload,
    ) -> Self {
        Self {
            x402_version: X402_VERSION,
            scheme: scheme.into(),
            network: network.into(),
            payload,
        }
    }

    /// Decode a header value into a payment payload
    pub fn from_base64(encoded: &str) -> Result<Self> {
        crate::codec::decode_payment(encoded)
    }

    /// Encode the payment payload for the `X-PAYMENT` header
    pub fn to_base64(&self) -> Result<String> {
        crate::codec::encode_payment(self)
    }

    /// Address of the payer
    pub fn payer(&self) -> &str {
        &self.payload.authorization.from
    }
}

/// Exact scheme payload: an EIP-3009 authorization bound to one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactEvmPayload {
    /// EIP-712 signature over the authorization
    pub signature: String,
    /// EIP-3009 authorization parameters
    pub authorization: ExactEvmPayloadAuthorization,
    /// Resource URL the proof was minted for
    pub resource: String,
    /// Random salt; `nonce == keccak256(resource || salt)`
    pub salt: String,
}

/// EIP-3009 authorization parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactEvmPayloadAuthorization {
    /// Payer's wallet address
    pub from: String,
    /// Recipient's wallet address
    pub to: String,
    /// Payment amount in atomic units
    pub value: String,
    /// Unix timestamp when authorization becomes valid
    #[serde(rename = "validAfter")]
    pub valid_after: String,
    /// Unix timestamp when authorization expires
    #[serde(rename = "validBefore")]
    pub valid_before: String,
    /// 32-byte nonce committing to the resource binding
    pub nonce: String,
}

impl ExactEvmPayloadAuthorization {
    /// Create a new authorization
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        value: impl Into<String>,
        valid_after: impl Into<String>,
        valid_before: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            value: value.into(),
            valid_after: valid_after.into(),
            valid_before: valid_before.into(),
            nonce: nonce.into(),
        }
    }

    pub fn valid_before_secs(&self) -> Result<i64> {
        self.valid_before
            .parse()
            .map_err(|_| X402Error::invalid_authorization("Invalid validBefore timestamp"))
    }
}

/// Body of a 402 Payment Required response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequirementsResponse {
    /// Protocol version
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    /// Why payment is required, or why the submitted proof failed
    pub error: String,
    /// Acceptable payment methods; never empty
    pub accepts: Vec<PaymentRequirements>,
    /// Payer the facilitator identified, when a proof was submitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl PaymentRequirementsResponse {
    /// Create a new payment requirements response
    pub fn new(error: impl Into<String>, accepts: Vec<PaymentRequirements>) -> Self {
        Self {
            x402_version: X402_VERSION,
            error: error.into(),
            accepts,
            payer: None,
        }
    }

    pub fn with_payer(mut self, payer: Option<String>) -> Self {
        self.payer = payer;
        self
    }
}
