//! Signing identities and exact-scheme proof construction

use crate::crypto::{eip712, signature};
use crate::types::{
    schemes, ExactEvmPayload, ExactEvmPayloadAuthorization, PaymentPayload, PaymentRequirements,
    VALID_AFTER_SKEW_SECONDS,
};
use crate::{Result, X402Error};
use async_trait::async_trait;
use ethereum_types::{H256, U256};
use secp256k1::SecretKey;

/// Something that can authorize payments from one address on one network
///
/// Implementations may hold key material in process ([`LocalSigner`]) or delegate
/// to a custody service. The interceptor only reads from a signer.
#[async_trait]
pub trait PaymentSigner: Send + Sync {
    /// Lowercase `0x` address of the payer
    fn address(&self) -> &str;

    /// Network this identity pays on
    fn network(&self) -> &str;

    /// Whether this signer can satisfy a requirement
    fn supports(&self, requirements: &PaymentRequirements) -> bool {
        requirements.scheme == schemes::EXACT && requirements.network == self.network()
    }

    /// Sign a 32-byte EIP-712 digest, returning a 65-byte hex signature
    async fn sign_digest(&self, digest: H256) -> Result<String>;
}

/// In-process signer holding a secp256k1 key
#[derive(Clone)]
pub struct LocalSigner {
    secret_key: SecretKey,
    address: String,
    network: String,
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .field("network", &self.network)
            .finish()
    }
}

impl LocalSigner {
    /// Build from a hex private key
    pub fn new(private_key: &str, network: impl Into<String>) -> Result<Self> {
        Ok(Self::from_secret_key(
            signature::parse_private_key(private_key)?,
            network,
        ))
    }

    /// Fresh random identity
    pub fn random(network: impl Into<String>) -> Self {
        Self::from_secret_key(signature::generate_private_key(), network)
    }

    fn from_secret_key(secret_key: SecretKey, network: impl Into<String>) -> Self {
        let address = signature::format_address(&signature::address_from_secret_key(&secret_key));
        Self {
            secret_key,
            address,
            network: network.into(),
        }
    }
}

#[async_trait]
impl PaymentSigner for LocalSigner {
    fn address(&self) -> &str {
        &self.address
    }

    fn network(&self) -> &str {
        &self.network
    }

    async fn sign_digest(&self, digest: H256) -> Result<String> {
        signature::sign_message_hash(digest, &self.secret_key)
    }
}

/// Build and sign an exact-scheme proof for `requirements` at unix time `now`
///
/// The authorization pays exactly `maxAmountRequired` to `payTo`, is valid from
/// `now - 600` until `now + maxTimeoutSeconds`, and its nonce commits to the
/// requirement's resource URL through a fresh random salt.
pub async fn create_payment(
    signer: &dyn PaymentSigner,
    requirements: &PaymentRequirements,
    now: i64,
) -> Result<PaymentPayload> {
    if !signer.supports(requirements) {
        return Err(X402Error::NetworkNotSupported {
            network: requirements.network.clone(),
        });
    }

    let domain = eip712::Domain::for_requirements(requirements)?;
    let salt = signature::generate_nonce();
    let nonce = eip712::resource_binding_nonce(&requirements.resource, &salt);

    let valid_after = now - VALID_AFTER_SKEW_SECONDS;
    let valid_before = now + i64::from(requirements.max_timeout_seconds);

    let value = U256::from_dec_str(&requirements.max_amount_required).map_err(|_| {
        X402Error::invalid_payment_requirements("maxAmountRequired must be a decimal integer")
    })?;

    let authorization = eip712::TransferAuthorization {
        from: eip712::parse_address(signer.address())?,
        to: eip712::parse_address(&requirements.pay_to)?,
        value,
        valid_after: U256::from(valid_after.max(0) as u64),
        valid_before: U256::from(valid_before.max(0) as u64),
        nonce,
    };
    let digest = eip712::transfer_with_authorization_hash(&domain, &authorization);
    let signature = signer.sign_digest(digest).await?;

    Ok(PaymentPayload::new(
        requirements.scheme.clone(),
        requirements.network.clone(),
        ExactEvmPayload {
            signature,
            authorization: ExactEvmPayloadAuthorization::new(
                signer.address(),
                requirements.pay_to.clone(),
                requirements.max_amount_required.clone(),
                valid_after.max(0).to_string(),
                valid_before.max(0).to_string(),
                format!("{:#x}", nonce),
            ),
            resource: requirements.resource.clone(),
            salt: format!("{:#x}", salt),
        },
    ))
}
