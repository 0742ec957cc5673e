//! EIP-712 typed data hashing for EIP-3009 `TransferWithAuthorization`

use crate::types::{ExactEvmPayloadAuthorization, NetworkConfig, PaymentRequirements};
use crate::{Result, X402Error};
use ethereum_types::{Address, H256, U256};
use std::str::FromStr;

const DOMAIN_TYPE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

const TRANSFER_WITH_AUTHORIZATION_TYPE: &[u8] = b"TransferWithAuthorization(address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)";

/// EIP-712 domain separator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Domain {
    /// Derive the token's signing domain from a payment requirement
    ///
    /// Name and version come from `extra`, falling back to the network's USDC metadata.
    pub fn for_requirements(requirements: &PaymentRequirements) -> Result<Self> {
        let network = NetworkConfig::from_name(&requirements.network).ok_or_else(|| {
            X402Error::NetworkNotSupported {
                network: requirements.network.clone(),
            }
        })?;

        let verifying_contract = parse_address(&requirements.asset)?;

        Ok(Self {
            name: requirements
                .extra_str("name")
                .unwrap_or(&network.usdc_name)
                .to_string(),
            version: requirements.extra_str("version").unwrap_or("2").to_string(),
            chain_id: network.chain_id,
            verifying_contract,
        })
    }

    /// Hash the domain separator
    pub fn separator(&self) -> H256 {
        let mut data = Vec::with_capacity(32 * 5);
        data.extend_from_slice(&keccak256(DOMAIN_TYPE));
        data.extend_from_slice(&keccak256(self.name.as_bytes()));
        data.extend_from_slice(&keccak256(self.version.as_bytes()));
        data.extend_from_slice(&encode_uint(U256::from(self.chain_id)));
        data.extend_from_slice(&encode_address(self.verifying_contract));
        H256::from(keccak256(&data))
    }
}

/// Typed EIP-3009 authorization ready for hashing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferAuthorization {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub valid_after: U256,
    pub valid_before: U256,
    pub nonce: H256,
}

impl TryFrom<&ExactEvmPayloadAuthorization> for TransferAuthorization {
    type Error = X402Error;

    fn try_from(auth: &ExactEvmPayloadAuthorization) -> Result<Self> {
        Ok(Self {
            from: parse_address(&auth.from)?,
            to: parse_address(&auth.to)?,
            value: parse_uint(&auth.value, "value")?,
            valid_after: parse_uint(&auth.valid_after, "validAfter")?,
            valid_before: parse_uint(&auth.valid_before, "validBefore")?,
            nonce: H256::from_str(auth.nonce.trim_start_matches("0x"))
                .map_err(|_| X402Error::invalid_authorization("Nonce must be 32 bytes of hex"))?,
        })
    }
}

impl TransferAuthorization {
    fn struct_hash(&self) -> [u8; 32] {
        let mut data = Vec::with_capacity(32 * 7);
        data.extend_from_slice(&keccak256(TRANSFER_WITH_AUTHORIZATION_TYPE));
        data.extend_from_slice(&encode_address(self.from));
        data.extend_from_slice(&encode_address(self.to));
        data.extend_from_slice(&encode_uint(self.value));
        data.extend_from_slice(&encode_uint(self.valid_after));
        data.extend_from_slice(&encode_uint(self.valid_before));
        data.extend_from_slice(self.nonce.as_bytes());
        keccak256(&data)
    }
}

/// EIP-712 digest: `keccak256(0x1901 || domainSeparator || structHash)`
pub fn transfer_with_authorization_hash(
    domain: &Domain,
    authorization: &TransferAuthorization,
) -> H256 {
    let mut data = Vec::with_capacity(2 + 32 + 32);
    data.extend_from_slice(&[0x19, 0x01]);
    data.extend_from_slice(domain.separator().as_bytes());
    data.extend_from_slice(&authorization.struct_hash());
    H256::from(keccak256(&data))
}

/// Nonce committing an authorization to one resource URL
pub fn resource_binding_nonce(resource: &str, salt: &H256) -> H256 {
    let mut data = Vec::with_capacity(resource.len() + 32);
    data.extend_from_slice(resource.as_bytes());
    data.extend_from_slice(salt.as_bytes());
    H256::from(keccak256(&data))
}

pub fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value.trim_start_matches("0x"))
        .map_err(|_| X402Error::invalid_authorization(format!("Invalid address: {}", value)))
}

fn parse_uint(value: &str, field: &str) -> Result<U256> {
    U256::from_dec_str(value)
        .map_err(|_| X402Error::invalid_authorization(format!("Invalid {}", field)))
}

fn encode_uint(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

fn encode_address(address: Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(address.as_bytes());
    out
}

/// Keccak-256 hash function
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    use sha3::{Digest, Keccak256};
    Keccak256::digest(data).into()
}
