//! Cryptographic utilities for x402 payments
//!
//! - [`eip712`] - EIP-712 hashing of EIP-3009 `TransferWithAuthorization` and the
//!   resource binding nonce
//! - [`signature`] - secp256k1 signing and public key recovery
//! - [`jwt`] - bearer tokens for authenticated facilitator and custody calls
//!
//! # Example
//!
//! ```
//! use x402_relay::crypto::{eip712, signature};
//!
//! let key = signature::generate_private_key();
//! let address = signature::address_from_secret_key(&key);
//!
//! let digest = ethereum_types::H256::from(eip712::keccak256(b"hello"));
//! let sig = signature::sign_message_hash(digest, &key).unwrap();
//! assert_eq!(signature::recover_signer(&sig, digest).unwrap(), address);
//! ```

pub mod eip712;
pub mod jwt;
pub mod signature;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use eip712::{resource_binding_nonce, Domain, TransferAuthorization};
pub use jwt::CdpCredentials;
pub use signature::{
    address_from_secret_key, format_address, generate_nonce, recover_signer, sign_message_hash,
};
