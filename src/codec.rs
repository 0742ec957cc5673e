//! Header codecs for the payment proof and the settlement confirmation
//!
//! Both headers carry base64-encoded JSON. Decoding only checks structure; whether a
//! proof is cryptographically valid is decided by the facilitator.
//!
//! Settlement confirmations are accepted either as base64 or as a raw JSON object string,
//! since both are seen from facilitators in the wild. JSON is tried first.

use crate::types::{PaymentPayload, SettlementConfirmation};
use crate::{Result, X402Error};
use base64::{engine::general_purpose, Engine as _};
use serde::de::DeserializeOwned;
use serde::Serialize;

fn encode<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)?;
    Ok(general_purpose::STANDARD.encode(json))
}

fn decode_base64<T: DeserializeOwned>(value: &str) -> Result<T> {
    let bytes = general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|e| X402Error::malformed_proof(format!("invalid base64: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| X402Error::malformed_proof(format!("invalid payload: {}", e)))
}

/// Encode a payment proof for the `X-PAYMENT` header
pub fn encode_payment(proof: &PaymentPayload) -> Result<String> {
    encode(proof)
}

/// Decode an `X-PAYMENT` header value
///
/// Fails with [`X402Error::MalformedProof`] on bad encoding or missing fields.
pub fn decode_payment(value: &str) -> Result<PaymentPayload> {
    if value.trim().is_empty() {
        return Err(X402Error::malformed_proof("empty payment header"));
    }
    decode_base64(value)
}

/// Encode a settlement confirmation for the `X-PAYMENT-RESPONSE` header
pub fn encode_settlement(confirmation: &SettlementConfirmation) -> Result<String> {
    encode(confirmation)
}

/// Decode an `X-PAYMENT-RESPONSE` header value, trying raw JSON before base64
pub fn decode_settlement(value: &str) -> Result<SettlementConfirmation> {
    let trimmed = value.trim();
    if trimmed.starts_with('{') {
        if let Ok(confirmation) = serde_json::from_str(trimmed) {
            return Ok(confirmation);
        }
    }
    decode_base64(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExactEvmPayload, ExactEvmPayloadAuthorization};

    fn sample_proof() -> PaymentPayload {
        PaymentPayload::new(
            "exact",
            "base-sepolia",
            ExactEvmPayload {
                signature: format!("0x{}", "ab".repeat(65)),
                authorization: ExactEvmPayloadAuthorization::new(
                    "0x857b06519e91e3a54538791bdbb0e22373e36b66",
                    "0x209693bc6afc0c5328ba36faf03c514ef312287c",
                    "10000",
                    "1745323200",
                    "1745323860",
                    format!("0x{}", "11".repeat(32)),
                ),
                resource: "http://localhost:3000/api/summarize".to_string(),
                salt: format!("0x{}", "22".repeat(32)),
            },
        )
    }

    fn sample_confirmation() -> SettlementConfirmation {
        SettlementConfirmation {
            success: true,
            error_reason: None,
            transaction: format!("0x{}", "cd".repeat(32)),
            network: "base-sepolia".to_string(),
            payer: Some("0x857b06519e91e3a54538791bdbb0e22373e36b66".to_string()),
        }
    }

    #[test]
    fn test_payment_round_trip_is_byte_stable() {
        let proof = sample_proof();
        let encoded = encode_payment(&proof).unwrap();
        let decoded = decode_payment(&encoded).unwrap();
        assert_eq!(decoded, proof);
        assert_eq!(encode_payment(&decoded).unwrap(), encoded);
    }

    #[test]
    fn test_payment_header_is_header_safe() {
        let encoded = encode_payment(&sample_proof()).unwrap();
        assert!(http::HeaderValue::from_str(&encoded).is_ok());
    }

    #[test]
    fn test_decode_payment_rejects_garbage() {
        let err = decode_payment("not base64 at all!").unwrap_err();
        assert!(matches!(err, X402Error::MalformedProof { .. }));

        let err = decode_payment("").unwrap_err();
        assert!(matches!(err, X402Error::MalformedProof { .. }));
    }

    #[test]
    fn test_decode_payment_rejects_missing_fields() {
        let partial = general_purpose::STANDARD
            .encode(r#"{"x402Version":1,"scheme":"exact","network":"base-sepolia"}"#);
        let err = decode_payment(&partial).unwrap_err();
        assert!(matches!(err, X402Error::MalformedProof { .. }));
        assert_eq!(err.error_code(), "malformed_proof");
    }

    #[test]
    fn test_settlement_accepts_base64() {
        let confirmation = sample_confirmation();
        let encoded = encode_settlement(&confirmation).unwrap();
        assert_eq!(decode_settlement(&encoded).unwrap(), confirmation);
    }

    #[test]
    fn test_settlement_accepts_raw_json() {
        let confirmation = sample_confirmation();
        let json = serde_json::to_string(&confirmation).unwrap();
        assert_eq!(decode_settlement(&json).unwrap(), confirmation);
    }

    #[test]
    fn test_settlement_rejects_garbage() {
        assert!(decode_settlement("{not json").is_err());
        assert!(decode_settlement("%%%").is_err());
    }
}
