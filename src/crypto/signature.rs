//! Signature utilities

use super::eip712::keccak256;
use crate::{Result, X402Error};
use ethereum_types::{Address, H256};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, VerifyingKey};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

/// Parse a hex private key
pub fn parse_private_key(private_key: &str) -> Result<SecretKey> {
    let bytes = hex::decode(private_key.trim_start_matches("0x"))
        .map_err(|_| X402Error::invalid_signature("Invalid hex private key"))?;
    SecretKey::from_slice(&bytes).map_err(|_| X402Error::invalid_signature("Invalid private key"))
}

/// Generate a fresh random private key
pub fn generate_private_key() -> SecretKey {
    use rand::RngCore;
    loop {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        if let Ok(key) = SecretKey::from_slice(&bytes) {
            return key;
        }
    }
}

/// Ethereum address controlled by a private key
pub fn address_from_secret_key(secret_key: &SecretKey) -> Address {
    let secp = Secp256k1::signing_only();
    let public_key = PublicKey::from_secret_key(&secp, secret_key);
    let uncompressed = public_key.serialize_uncompressed();
    address_from_uncompressed(&uncompressed[1..])
}

fn address_from_uncompressed(xy: &[u8]) -> Address {
    let hash = keccak256(xy);
    Address::from_slice(&hash[12..])
}

/// Lowercase `0x`-prefixed hex form of an address
pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

/// Sign a 32-byte digest, returning a 65-byte `r || s || v` hex signature (v = 27/28)
pub fn sign_message_hash(message_hash: H256, secret_key: &SecretKey) -> Result<String> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest_slice(message_hash.as_bytes())
        .map_err(|_| X402Error::invalid_signature("Invalid message hash"))?;

    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&message, secret_key)
        .serialize_compact();

    let mut sig_bytes = [0u8; 65];
    sig_bytes[..64].copy_from_slice(&compact);
    sig_bytes[64] = 27 + recovery_id.to_i32() as u8;

    Ok(format!("0x{}", hex::encode(sig_bytes)))
}

/// Recover the address that produced `signature` over `message_hash`
pub fn recover_signer(signature: &str, message_hash: H256) -> Result<Address> {
    let sig_bytes = hex::decode(signature.trim_start_matches("0x"))
        .map_err(|_| X402Error::invalid_signature("Invalid hex signature"))?;

    if sig_bytes.len() != 65 {
        return Err(X402Error::invalid_signature("Signature must be 65 bytes"));
    }

    let v = match sig_bytes[64] {
        v @ 27..=28 => v - 27,
        v => v,
    };
    let recovery_id =
        RecoveryId::try_from(v).map_err(|_| X402Error::invalid_signature("Invalid recovery ID"))?;

    let k256_sig = K256Signature::try_from(&sig_bytes[..64])
        .map_err(|_| X402Error::invalid_signature("Invalid signature format"))?;

    let verifying_key =
        VerifyingKey::recover_from_prehash(message_hash.as_bytes(), &k256_sig, recovery_id)
            .map_err(|_| X402Error::invalid_signature("Failed to recover public key"))?;

    let point = verifying_key.to_encoded_point(false);
    Ok(address_from_uncompressed(&point.as_bytes()[1..]))
}

/// Check that `signature` over `message_hash` was produced by `expected`
pub fn verify_signature(signature: &str, message_hash: H256, expected: Address) -> Result<bool> {
    Ok(recover_signer(signature, message_hash)? == expected)
}

/// Generate a random 32-byte value (salts, nonces)
pub fn generate_nonce() -> H256 {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    H256::from_slice(&bytes)
}
