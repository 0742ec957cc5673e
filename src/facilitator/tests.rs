//! Tests for the facilitator client and the in-process facilitator

use super::local::{reasons, LocalFacilitator};
use super::{Facilitator, FacilitatorClient};
use crate::facilitator_storage::{InMemoryStorage, NonceStorage};
use crate::signer::{create_payment, LocalSigner};
use crate::types::{
    networks, FacilitatorConfig, NetworkConfig, PaymentPayload, PaymentRequirements,
};
use crate::X402Error;
use mockito::{Matcher, Server};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

const NOW: i64 = 1_745_323_200;
const PAY_TO: &str = "0x209693bc6afc0c5328ba36faf03c514ef312287c";

fn create_test_payment_requirements() -> PaymentRequirements {
    let network = NetworkConfig::from_name(networks::BASE_SEPOLIA).unwrap();
    let mut req = PaymentRequirements::new(
        "exact",
        networks::BASE_SEPOLIA,
        "10000",
        network.usdc_contract.clone(),
        PAY_TO,
        "http://localhost:3000/api/summarize",
        "Text summarization service",
    );
    req.set_usdc_info(&network);
    req
}

async fn signed_proof(req: &PaymentRequirements) -> PaymentPayload {
    let signer = LocalSigner::random(networks::BASE_SEPOLIA);
    create_payment(&signer, req, NOW).await.unwrap()
}

fn local_facilitator() -> (LocalFacilitator, InMemoryStorage) {
    let storage = InMemoryStorage::new();
    let facilitator = LocalFacilitator::new(storage.clone()).with_clock(|| NOW);
    (facilitator, storage)
}

// HTTP client

#[tokio::test]
async fn test_facilitator_client_creation() {
    let config = FacilitatorConfig::new("https://example.com/facilitator/");
    let client = FacilitatorClient::new(config).unwrap();
    assert_eq!(client.url(), "https://example.com/facilitator");
}

#[test]
fn test_facilitator_client_creation_with_invalid_config() {
    assert!(FacilitatorClient::new(FacilitatorConfig::new("")).is_err());
    assert!(FacilitatorClient::new(FacilitatorConfig::new("ftp://example.com")).is_err());
}

#[tokio::test]
async fn test_facilitator_verify_sends_versioned_body() {
    let mut server = Server::new_async().await;
    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;

    let mock = server
        .mock("POST", "/verify")
        .match_body(Matcher::PartialJson(json!({
            "x402Version": 1,
            "paymentPayload": { "scheme": "exact", "network": "base-sepolia" },
            "paymentRequirements": { "maxAmountRequired": "10000", "payTo": PAY_TO },
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "isValid": true, "payer": proof.payer() }).to_string())
        .create_async()
        .await;

    let client = FacilitatorClient::new(FacilitatorConfig::new(server.url())).unwrap();
    let response = client.verify(&proof, &req).await.unwrap();

    assert!(response.is_valid);
    assert_eq!(response.payer.as_deref(), Some(proof.payer()));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_facilitator_verify_invalid_verdict() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/verify")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "isValid": false,
                "invalidReason": "invalid_signature",
                "payer": "0x857b06519e91e3a54538791bdbb0e22373e36b66"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;
    let client = FacilitatorClient::new(FacilitatorConfig::new(server.url())).unwrap();
    let response = client.verify(&proof, &req).await.unwrap();

    assert!(!response.is_valid);
    assert_eq!(response.invalid_reason.as_deref(), Some("invalid_signature"));
}

#[tokio::test]
async fn test_facilitator_settle_success() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/settle")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "success": true,
                "transaction": "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef",
                "network": "base-sepolia",
                "payer": "0x857b06519e91e3a54538791bdbb0e22373e36b66"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;
    let client = FacilitatorClient::new(FacilitatorConfig::new(server.url())).unwrap();
    let response = client.settle(&proof, &req).await.unwrap();

    assert!(response.success);
    assert_eq!(response.network, "base-sepolia");
}

#[tokio::test]
async fn test_facilitator_server_error_is_unavailable() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/verify")
        .with_status(503)
        .create_async()
        .await;

    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;
    let client = FacilitatorClient::new(FacilitatorConfig::new(server.url())).unwrap();
    let err = client.verify(&proof, &req).await.unwrap_err();

    assert!(matches!(err, X402Error::FacilitatorUnavailable { .. }));
    assert_eq!(err.status_code(), http::StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_facilitator_client_error_is_distinct() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/settle")
        .with_status(400)
        .with_body("bad request")
        .create_async()
        .await;

    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;
    let client = FacilitatorClient::new(FacilitatorConfig::new(server.url())).unwrap();
    let err = client.settle(&proof, &req).await.unwrap_err();

    assert!(matches!(err, X402Error::FacilitatorError { .. }));
    assert_eq!(err.status_code(), http::StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_facilitator_garbage_body_is_error_not_verdict() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/verify")
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create_async()
        .await;

    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;
    let client = FacilitatorClient::new(FacilitatorConfig::new(server.url())).unwrap();
    let err = client.verify(&proof, &req).await.unwrap_err();

    assert!(matches!(err, X402Error::FacilitatorError { .. }));
}

#[tokio::test]
async fn test_facilitator_unreachable() {
    // Nothing listens on port 9 locally
    let config = FacilitatorConfig::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(2));
    let client = FacilitatorClient::new(config).unwrap();

    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;
    let err = client.verify(&proof, &req).await.unwrap_err();

    assert!(matches!(err, X402Error::FacilitatorUnavailable { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_facilitator_timeout() {
    let config = FacilitatorConfig::new("http://10.255.255.1:9999") // Non-routable IP
        .with_timeout(Duration::from_millis(1));
    let client = FacilitatorClient::new(config).unwrap();

    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;
    let err = client.verify(&proof, &req).await.unwrap_err();
    assert!(matches!(err, X402Error::FacilitatorUnavailable { .. }));
}

#[tokio::test]
async fn test_facilitator_with_auth_headers() {
    let mut server = Server::new_async().await;
    let verify_mock = server
        .mock("POST", "/verify")
        .match_header("authorization", "Bearer verify-token")
        .with_status(200)
        .with_body(json!({ "isValid": true }).to_string())
        .create_async()
        .await;
    let supported_mock = server
        .mock("GET", "/supported")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(json!({ "kinds": [] }).to_string())
        .create_async()
        .await;

    let config = FacilitatorConfig::new(server.url()).with_auth_headers(Box::new(|| {
        let mut headers = HashMap::new();
        let mut verify = HashMap::new();
        verify.insert("Authorization".to_string(), "Bearer verify-token".to_string());
        headers.insert("verify".to_string(), verify);
        Ok(headers)
    }));
    let client = FacilitatorClient::new(config).unwrap();

    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;
    client.verify(&proof, &req).await.unwrap();
    client.supported().await.unwrap();

    verify_mock.assert_async().await;
    supported_mock.assert_async().await;
}

#[tokio::test]
async fn test_facilitator_supported() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/supported")
        .with_status(200)
        .with_body(
            json!({
                "kinds": [
                    { "x402Version": 1, "scheme": "exact", "network": "base-sepolia" },
                    { "x402Version": 1, "scheme": "exact", "network": "base" }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = FacilitatorClient::new(FacilitatorConfig::new(server.url())).unwrap();
    let supported = client.supported().await.unwrap();
    assert_eq!(supported.kinds.len(), 2);
    assert_eq!(supported.kinds[0].network, "base-sepolia");
}

#[test]
fn test_coinbase_config_signs_each_endpoint() {
    let config = super::coinbase::create_facilitator_config("key-id", "key-secret");
    assert_eq!(config.url, "https://api.cdp.coinbase.com/platform/v2/x402");

    let headers = (config.create_auth_headers.unwrap())().unwrap();
    for endpoint in ["verify", "settle", "supported"] {
        let endpoint_headers = &headers[endpoint];
        assert!(endpoint_headers["Authorization"].starts_with("Bearer "));
        assert!(endpoint_headers["Correlation-Context"].contains("sdk_language=rust"));
    }
}

// In-process facilitator

#[tokio::test]
async fn test_local_verify_accepts_valid_proof() {
    let (facilitator, _) = local_facilitator();
    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;

    let response = facilitator.verify(&proof, &req).await.unwrap();
    assert!(response.is_valid, "{:?}", response.invalid_reason);
    assert_eq!(response.payer.as_deref(), Some(proof.payer()));
}

#[tokio::test]
async fn test_local_verify_does_not_consume_nonce() {
    let (facilitator, storage) = local_facilitator();
    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;

    assert!(facilitator.verify(&proof, &req).await.unwrap().is_valid);
    assert!(facilitator.verify(&proof, &req).await.unwrap().is_valid);
    assert!(storage.is_empty().await);
}

#[tokio::test]
async fn test_local_settle_once() {
    let (facilitator, storage) = local_facilitator();
    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;

    let first = facilitator.settle(&proof, &req).await.unwrap();
    assert!(first.success);
    assert!(first.transaction.starts_with("0x"));
    assert_eq!(first.transaction.len(), 66);
    assert_eq!(first.payer.as_deref(), Some(proof.payer()));

    let replay = facilitator.settle(&proof, &req).await.unwrap();
    assert!(!replay.success);
    assert_eq!(replay.error_reason.as_deref(), Some(reasons::NONCE_ALREADY_USED));

    let verdict = facilitator.verify(&proof, &req).await.unwrap();
    assert_eq!(verdict.invalid_reason.as_deref(), Some(reasons::NONCE_ALREADY_USED));
    assert!(storage
        .has_nonce(&proof.payload.authorization.nonce.to_ascii_lowercase())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_local_replay_with_uppercase_nonce_is_caught() {
    let (facilitator, _) = local_facilitator();
    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;
    assert!(facilitator.settle(&proof, &req).await.unwrap().success);

    let mut shouty = proof.clone();
    shouty.payload.authorization.nonce = format!(
        "0x{}",
        proof.payload.authorization.nonce[2..].to_ascii_uppercase()
    );
    let replay = facilitator.settle(&shouty, &req).await.unwrap();
    assert!(!replay.success);
}

#[tokio::test]
async fn test_local_settle_rejects_invalid_proof() {
    let (facilitator, storage) = local_facilitator();
    let req = create_test_payment_requirements();
    let mut proof = signed_proof(&req).await;
    proof.payload.authorization.value = "1".to_string();

    let result = facilitator.settle(&proof, &req).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error_reason.as_deref(), Some(reasons::PRICE_MISMATCH));
    assert!(storage.is_empty().await);
}

async fn reason_for(proof: &PaymentPayload, req: &PaymentRequirements, now: i64) -> String {
    let facilitator = LocalFacilitator::new(InMemoryStorage::new()).with_clock(move || now);
    let response = facilitator.verify(proof, req).await.unwrap();
    assert!(!response.is_valid);
    response.invalid_reason.unwrap()
}

#[tokio::test]
async fn test_local_rejects_unsupported_scheme() {
    let req = create_test_payment_requirements();
    let mut proof = signed_proof(&req).await;
    proof.scheme = "upto".to_string();
    assert_eq!(reason_for(&proof, &req, NOW).await, reasons::UNSUPPORTED_SCHEME);
}

#[tokio::test]
async fn test_local_rejects_network_mismatch() {
    let req = create_test_payment_requirements();
    let mut proof = signed_proof(&req).await;
    proof.network = "base".to_string();
    assert_eq!(reason_for(&proof, &req, NOW).await, reasons::NETWORK_MISMATCH);
}

#[tokio::test]
async fn test_local_rejects_other_resource() {
    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;

    let mut other = req.clone();
    other.resource = "http://localhost:3000/api/translate".to_string();
    assert_eq!(
        reason_for(&proof, &other, NOW).await,
        reasons::RESOURCE_BINDING_MISMATCH
    );
}

#[tokio::test]
async fn test_local_rejects_relabelled_resource() {
    // Claiming the requested resource without a matching nonce
    let req = create_test_payment_requirements();
    let mut proof = signed_proof(&req).await;
    proof.payload.salt = format!("0x{}", "00".repeat(32));
    assert_eq!(
        reason_for(&proof, &req, NOW).await,
        reasons::RESOURCE_BINDING_MISMATCH
    );
}

#[tokio::test]
async fn test_local_rejects_not_yet_valid() {
    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;
    assert_eq!(
        reason_for(&proof, &req, NOW - 601).await,
        reasons::NOT_YET_VALID
    );
}

#[tokio::test]
async fn test_local_rejects_expired() {
    let mut req = create_test_payment_requirements();
    req.max_timeout_seconds = 1;
    let proof = signed_proof(&req).await;
    let reason = reason_for(&proof, &req, NOW + 2).await;
    assert_eq!(reason, reasons::EXPIRED);
    assert!(reason.contains("expired"));
}

#[tokio::test]
async fn test_local_rejects_long_window() {
    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;

    let mut strict = req.clone();
    strict.max_timeout_seconds = 10;
    assert_eq!(
        reason_for(&proof, &strict, NOW).await,
        reasons::WINDOW_TOO_LONG
    );
}

#[tokio::test]
async fn test_local_tolerates_payer_clock_running_ahead() {
    let req = create_test_payment_requirements();
    let signer = LocalSigner::random(networks::BASE_SEPOLIA);
    let proof = create_payment(&signer, &req, NOW + 5).await.unwrap();

    let (facilitator, _) = local_facilitator();
    let response = facilitator.verify(&proof, &req).await.unwrap();
    assert!(response.is_valid, "{:?}", response.invalid_reason);
}

#[tokio::test]
async fn test_local_rejects_payer_clock_beyond_skew() {
    let req = create_test_payment_requirements();
    let signer = LocalSigner::random(networks::BASE_SEPOLIA);
    let proof = create_payment(&signer, &req, NOW + 31).await.unwrap();

    assert_eq!(
        reason_for(&proof, &req, NOW).await,
        reasons::WINDOW_TOO_LONG
    );
}

#[tokio::test]
async fn test_local_rejects_price_mismatch() {
    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;

    let mut pricier = req.clone();
    pricier.max_amount_required = "20000".to_string();
    assert_eq!(
        reason_for(&proof, &pricier, NOW).await,
        reasons::PRICE_MISMATCH
    );
}

#[tokio::test]
async fn test_local_rejects_recipient_mismatch() {
    let req = create_test_payment_requirements();
    let proof = signed_proof(&req).await;

    let mut other = req.clone();
    other.pay_to = "0x857b06519e91e3a54538791bdbb0e22373e36b66".to_string();
    assert_eq!(
        reason_for(&proof, &other, NOW).await,
        reasons::RECIPIENT_MISMATCH
    );
}

#[tokio::test]
async fn test_local_rejects_forged_payer() {
    let req = create_test_payment_requirements();
    let mut proof = signed_proof(&req).await;
    proof.payload.authorization.from = "0x857b06519e91e3a54538791bdbb0e22373e36b66".to_string();
    assert_eq!(
        reason_for(&proof, &req, NOW).await,
        reasons::INVALID_SIGNATURE
    );
}

#[tokio::test]
async fn test_local_rejects_garbage_signature() {
    let req = create_test_payment_requirements();
    let mut proof = signed_proof(&req).await;
    proof.payload.signature = "0x1234".to_string();
    assert_eq!(
        reason_for(&proof, &req, NOW).await,
        reasons::INVALID_SIGNATURE
    );
}

#[tokio::test]
async fn test_local_supported_kinds() {
    let (facilitator, _) = local_facilitator();
    let supported = facilitator.supported().await.unwrap();
    let networks: Vec<_> = supported.kinds.iter().map(|k| k.network.as_str()).collect();
    assert_eq!(
        networks,
        vec!["base", "base-sepolia", "avalanche", "avalanche-fuji"]
    );
    assert!(supported.kinds.iter().all(|k| k.scheme == "exact"));
}

#[cfg(feature = "axum")]
mod router {
    use super::*;
    use crate::facilitator::local::router;
    use crate::types::{FacilitatorRequest, SettlementConfirmation, VerifyResponse};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn post(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_router_verify_and_settle() {
        let (facilitator, _) = local_facilitator();
        let app = router(facilitator);
        let req = create_test_payment_requirements();
        let proof = signed_proof(&req).await;
        let body = serde_json::to_value(FacilitatorRequest::new(&proof, &req)).unwrap();

        let response = app.clone().oneshot(post("/verify", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let verdict: VerifyResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(verdict.is_valid);

        let response = app.oneshot(post("/settle", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let receipt: SettlementConfirmation = serde_json::from_slice(&bytes).unwrap();
        assert!(receipt.success);
    }

    #[tokio::test]
    async fn test_router_rejects_version_mismatch() {
        let (facilitator, _) = local_facilitator();
        let req = create_test_payment_requirements();
        let proof = signed_proof(&req).await;
        let mut body = serde_json::to_value(FacilitatorRequest::new(&proof, &req)).unwrap();
        body["x402Version"] = json!(2);

        let response = router(facilitator)
            .oneshot(post("/verify", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(error["code"], "invalid_request");
    }

    #[tokio::test]
    async fn test_router_health() {
        let (facilitator, _) = local_facilitator();
        let response = router(facilitator)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
