//! In-process facilitator for the exact scheme
//!
//! Checks proofs locally and records settlement in a nonce ledger instead of
//! submitting a transfer on-chain. Each failed check yields a stable `invalidReason`;
//! checks run in a fixed order and the first failure wins:
//!
//! | reason | condition |
//! |---|---|
//! | `unsupported_scheme` | scheme is not `exact` on both sides |
//! | `network_mismatch` | proof network differs from the requirement, or is unknown |
//! | `resource_binding_mismatch` | proof resource differs, or nonce != keccak256(resource \|\| salt) |
//! | `invalid_authorization` | an authorization field does not parse |
//! | `authorization_not_yet_valid` | now < validAfter |
//! | `authorization_expired` | now >= validBefore |
//! | `authorization_window_too_long` | validBefore > now + maxTimeoutSeconds + 30s skew |
//! | `price_mismatch` | value != maxAmountRequired |
//! | `recipient_mismatch` | to != payTo |
//! | `invalid_signature` | recovered signer != from |
//! | `nonce_already_used` | the nonce is already in the ledger |
//!
//! Verification never touches the ledger. Settlement re-verifies and then claims the
//! nonce atomically, so a proof settles at most once.

use super::Facilitator;
use crate::crypto::{eip712, signature};
use crate::facilitator_storage::NonceStorage;
use crate::types::{
    networks, schemes, PaymentPayload, PaymentRequirements, SettlementConfirmation,
    SupportedKind, SupportedKinds, VerifyResponse, VALID_BEFORE_SKEW_SECONDS, X402_VERSION,
};
use crate::Result;
use async_trait::async_trait;
use ethereum_types::{H256, U256};
use std::str::FromStr;
use std::sync::Arc;

/// Source of the current unix time in seconds
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Stable verification failure reasons
pub mod reasons {
    pub const UNSUPPORTED_SCHEME: &str = "unsupported_scheme";
    pub const NETWORK_MISMATCH: &str = "network_mismatch";
    pub const RESOURCE_BINDING_MISMATCH: &str = "resource_binding_mismatch";
    pub const INVALID_AUTHORIZATION: &str = "invalid_authorization";
    pub const NOT_YET_VALID: &str = "authorization_not_yet_valid";
    pub const EXPIRED: &str = "authorization_expired";
    pub const WINDOW_TOO_LONG: &str = "authorization_window_too_long";
    pub const PRICE_MISMATCH: &str = "price_mismatch";
    pub const RECIPIENT_MISMATCH: &str = "recipient_mismatch";
    pub const INVALID_SIGNATURE: &str = "invalid_signature";
    pub const NONCE_ALREADY_USED: &str = "nonce_already_used";
}

/// Facilitator that verifies signatures itself and keeps a replay ledger
#[derive(Clone)]
pub struct LocalFacilitator {
    storage: Arc<dyn NonceStorage>,
    clock: Clock,
}

impl std::fmt::Debug for LocalFacilitator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFacilitator")
            .field("storage", &"<NonceStorage>")
            .finish()
    }
}

impl LocalFacilitator {
    pub fn new(storage: impl NonceStorage + 'static) -> Self {
        Self::with_shared_storage(Arc::new(storage))
    }

    pub fn with_shared_storage(storage: Arc<dyn NonceStorage>) -> Self {
        Self {
            storage,
            clock: Arc::new(|| chrono::Utc::now().timestamp()),
        }
    }

    /// Replace the wall clock, e.g. to simulate elapsed time
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Run every check except the ledger lookup; `Err(reason)` on the first failure
    fn check(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
        now: i64,
    ) -> std::result::Result<(), &'static str> {
        if payload.scheme != schemes::EXACT || requirements.scheme != schemes::EXACT {
            return Err(reasons::UNSUPPORTED_SCHEME);
        }

        if payload.network != requirements.network || !networks::is_supported(&payload.network) {
            return Err(reasons::NETWORK_MISMATCH);
        }

        let exact = &payload.payload;
        let salt = H256::from_str(exact.salt.trim_start_matches("0x"))
            .map_err(|_| reasons::RESOURCE_BINDING_MISMATCH)?;
        let expected_nonce = eip712::resource_binding_nonce(&requirements.resource, &salt);
        let nonce = H256::from_str(exact.authorization.nonce.trim_start_matches("0x"))
            .map_err(|_| reasons::RESOURCE_BINDING_MISMATCH)?;
        if exact.resource != requirements.resource || nonce != expected_nonce {
            return Err(reasons::RESOURCE_BINDING_MISMATCH);
        }

        let authorization = eip712::TransferAuthorization::try_from(&exact.authorization)
            .map_err(|_| reasons::INVALID_AUTHORIZATION)?;

        let now_u = U256::from(now.max(0) as u64);
        if now_u < authorization.valid_after {
            return Err(reasons::NOT_YET_VALID);
        }
        if now_u >= authorization.valid_before {
            return Err(reasons::EXPIRED);
        }
        let deadline = now_u
            + U256::from(requirements.max_timeout_seconds)
            + U256::from(VALID_BEFORE_SKEW_SECONDS);
        if authorization.valid_before > deadline {
            return Err(reasons::WINDOW_TOO_LONG);
        }

        let required = U256::from_dec_str(&requirements.max_amount_required)
            .map_err(|_| reasons::PRICE_MISMATCH)?;
        if authorization.value != required {
            return Err(reasons::PRICE_MISMATCH);
        }

        let pay_to =
            eip712::parse_address(&requirements.pay_to).map_err(|_| reasons::RECIPIENT_MISMATCH)?;
        if authorization.to != pay_to {
            return Err(reasons::RECIPIENT_MISMATCH);
        }

        let domain =
            eip712::Domain::for_requirements(requirements).map_err(|_| reasons::NETWORK_MISMATCH)?;
        let digest = eip712::transfer_with_authorization_hash(&domain, &authorization);
        match signature::recover_signer(&exact.signature, digest) {
            Ok(signer) if signer == authorization.from => Ok(()),
            _ => Err(reasons::INVALID_SIGNATURE),
        }
    }

    async fn verify_at(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
        now: i64,
    ) -> Result<VerifyResponse> {
        let payer = Some(payload.payer().to_string());

        if let Err(reason) = self.check(payload, requirements, now) {
            tracing::warn!(payer = payload.payer(), reason, "Payment proof rejected");
            return Ok(VerifyResponse::invalid(reason, payer));
        }

        if self.storage.has_nonce(&ledger_key(payload)).await? {
            tracing::warn!(payer = payload.payer(), "Payment proof replayed");
            return Ok(VerifyResponse::invalid(reasons::NONCE_ALREADY_USED, payer));
        }

        Ok(VerifyResponse::valid(payload.payer()))
    }
}

/// Ledger key for a proof's nonce, independent of hex casing and prefix
fn ledger_key(payload: &PaymentPayload) -> String {
    let nonce = &payload.payload.authorization.nonce;
    format!("0x{}", nonce.trim_start_matches("0x").to_ascii_lowercase())
}

/// Deterministic settlement reference: keccak256(nonce || signature)
fn settlement_reference(payload: &PaymentPayload) -> String {
    let mut data = payload.payload.authorization.nonce.as_bytes().to_vec();
    data.extend_from_slice(payload.payload.signature.as_bytes());
    format!("0x{}", hex::encode(eip712::keccak256(&data)))
}

#[async_trait]
impl Facilitator for LocalFacilitator {
    async fn verify(
        &self,
        payment_payload: &PaymentPayload,
        payment_requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse> {
        self.verify_at(payment_payload, payment_requirements, (self.clock)())
            .await
    }

    async fn settle(
        &self,
        payment_payload: &PaymentPayload,
        payment_requirements: &PaymentRequirements,
    ) -> Result<SettlementConfirmation> {
        let payer = Some(payment_payload.payer().to_string());
        let network = payment_payload.network.clone();

        let verdict = self
            .verify_at(payment_payload, payment_requirements, (self.clock)())
            .await?;
        if !verdict.is_valid {
            let reason = verdict
                .invalid_reason
                .unwrap_or_else(|| reasons::INVALID_AUTHORIZATION.to_string());
            return Ok(SettlementConfirmation::failed(reason, network, payer));
        }

        // Two settlements can pass verification concurrently; only one claims the nonce
        if !self.storage.mark_nonce(&ledger_key(payment_payload)).await? {
            tracing::warn!(payer = payment_payload.payer(), "Lost settlement race");
            return Ok(SettlementConfirmation::failed(
                reasons::NONCE_ALREADY_USED,
                network,
                payer,
            ));
        }

        let transaction = settlement_reference(payment_payload);
        tracing::info!(
            payer = payment_payload.payer(),
            amount = %payment_payload.payload.authorization.value,
            network = %network,
            transaction = %transaction,
            "Payment settled"
        );

        Ok(SettlementConfirmation {
            success: true,
            error_reason: None,
            transaction,
            network,
            payer,
        })
    }

    async fn supported(&self) -> Result<SupportedKinds> {
        Ok(SupportedKinds {
            kinds: networks::all_supported()
                .into_iter()
                .map(|network| SupportedKind {
                    x402_version: X402_VERSION,
                    scheme: schemes::EXACT.to_string(),
                    network: network.to_string(),
                    metadata: None,
                })
                .collect(),
        })
    }
}

#[cfg(feature = "axum")]
pub use self::routes::router;

#[cfg(feature = "axum")]
mod routes {
    use super::LocalFacilitator;
    use crate::facilitator::Facilitator;
    use crate::types::{
        FacilitatorRequest, SettlementConfirmation, SupportedKinds, VerifyResponse, X402_VERSION,
    };
    use crate::X402Error;
    use axum::{
        extract::State,
        response::Json,
        routing::{get, post},
        Router,
    };
    use std::sync::Arc;

    type AppState = Arc<LocalFacilitator>;

    /// `/verify`, `/settle`, `/supported` and `/health`
    pub fn router(facilitator: LocalFacilitator) -> Router {
        Router::new()
            .route("/verify", post(verify_handler))
            .route("/settle", post(settle_handler))
            .route("/supported", get(supported_handler))
            .route("/health", get(health_handler))
            .with_state(Arc::new(facilitator))
    }

    fn check_version(request: &FacilitatorRequest) -> Result<(), X402Error> {
        if request.x402_version != X402_VERSION {
            return Err(X402Error::invalid_request(format!(
                "Unsupported x402Version {}",
                request.x402_version
            )));
        }
        Ok(())
    }

    async fn verify_handler(
        State(facilitator): State<AppState>,
        Json(request): Json<FacilitatorRequest>,
    ) -> Result<Json<VerifyResponse>, X402Error> {
        check_version(&request)?;
        let response = facilitator
            .verify(&request.payment_payload, &request.payment_requirements)
            .await?;
        Ok(Json(response))
    }

    async fn settle_handler(
        State(facilitator): State<AppState>,
        Json(request): Json<FacilitatorRequest>,
    ) -> Result<Json<SettlementConfirmation>, X402Error> {
        check_version(&request)?;
        let response = facilitator
            .settle(&request.payment_payload, &request.payment_requirements)
            .await?;
        Ok(Json(response))
    }

    async fn supported_handler(
        State(facilitator): State<AppState>,
    ) -> Result<Json<SupportedKinds>, X402Error> {
        Ok(Json(facilitator.supported().await?))
    }

    async fn health_handler() -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "status": "healthy",
            "service": "x402-facilitator",
            "version": crate::VERSION,
        }))
    }
}
