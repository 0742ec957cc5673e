//! Tests for cryptographic utilities

use super::{eip712, jwt, signature};
use crate::types::{networks, ExactEvmPayloadAuthorization, NetworkConfig, PaymentRequirements};
use ethereum_types::{Address, H256, U256};
use std::str::FromStr;

fn base_sepolia_requirements() -> PaymentRequirements {
    let network = NetworkConfig::from_name(networks::BASE_SEPOLIA).unwrap();
    let mut req = PaymentRequirements::new(
        "exact",
        networks::BASE_SEPOLIA,
        "10000",
        network.usdc_contract.clone(),
        "0x209693bc6afc0c5328ba36faf03c514ef312287c",
        "http://localhost:3000/api/summarize",
        "Text summarization service",
    );
    req.set_usdc_info(&network);
    req
}

#[test]
fn test_keccak256_empty_input() {
    assert_eq!(
        hex::encode(eip712::keccak256(b"")),
        "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
    );
}

#[test]
fn test_address_from_known_key() {
    let key = signature::parse_private_key(
        "0x0000000000000000000000000000000000000000000000000000000000000001",
    )
    .unwrap();
    let address = signature::address_from_secret_key(&key);
    assert_eq!(
        signature::format_address(&address),
        "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
    );
}

#[test]
fn test_parse_private_key_rejects_garbage() {
    assert!(signature::parse_private_key("0xnothex").is_err());
    assert!(signature::parse_private_key("0x00").is_err());
}

#[test]
fn test_sign_and_recover_round_trip() {
    let key = signature::generate_private_key();
    let address = signature::address_from_secret_key(&key);
    let digest = H256::from(eip712::keccak256(b"x402"));

    let sig = signature::sign_message_hash(digest, &key).unwrap();
    let raw = hex::decode(sig.trim_start_matches("0x")).unwrap();
    assert_eq!(raw.len(), 65);
    assert!(raw[64] == 27 || raw[64] == 28);

    assert_eq!(signature::recover_signer(&sig, digest).unwrap(), address);
    assert!(signature::verify_signature(&sig, digest, address).unwrap());
    assert!(!signature::verify_signature(&sig, H256::zero(), address).unwrap());
}

#[test]
fn test_recover_rejects_short_signature() {
    let err = signature::recover_signer("0xdeadbeef", H256::zero()).unwrap_err();
    assert_eq!(err.error_code(), "invalid_signature");
}

#[test]
fn test_nonce_generation() {
    let nonce1 = signature::generate_nonce();
    let nonce2 = signature::generate_nonce();
    assert_ne!(nonce1, nonce2);
}

#[test]
fn test_domain_for_requirements_uses_extra() {
    let req = base_sepolia_requirements();
    let domain = eip712::Domain::for_requirements(&req).unwrap();

    assert_eq!(domain.name, "USDC");
    assert_eq!(domain.version, "2");
    assert_eq!(domain.chain_id, 84532);
    assert_eq!(
        domain.verifying_contract,
        Address::from_str("036CbD53842c5426634e7929541eC2318f3dCF7e").unwrap()
    );
}

#[test]
fn test_domain_for_unknown_network_fails() {
    let mut req = base_sepolia_requirements();
    req.network = "solana".to_string();
    assert!(matches!(
        eip712::Domain::for_requirements(&req),
        Err(crate::X402Error::NetworkNotSupported { .. })
    ));
}

#[test]
fn test_domain_separator_depends_on_chain() {
    let req = base_sepolia_requirements();
    let domain = eip712::Domain::for_requirements(&req).unwrap();
    let mut other = domain.clone();
    other.chain_id = 8453;

    assert_eq!(domain.separator(), domain.separator());
    assert_ne!(domain.separator(), other.separator());
}

#[test]
fn test_resource_binding_nonce_commits_to_resource() {
    let salt = H256::repeat_byte(0x22);
    let a = eip712::resource_binding_nonce("http://localhost:3000/api/summarize", &salt);
    let b = eip712::resource_binding_nonce("http://localhost:3000/api/summarize", &salt);
    let c = eip712::resource_binding_nonce("http://localhost:3000/api/translate", &salt);

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_transfer_authorization_parsing() {
    let auth = ExactEvmPayloadAuthorization::new(
        "0x857b06519E91e3A54538791bDbb0E22373e36b66",
        "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
        "10000",
        "1745323800",
        "1745323985",
        "0xf3746613c2d920b5fdabc0856f2aeb2d4f88ee6037b8cc5d04a71a4462f13480",
    );
    let typed = eip712::TransferAuthorization::try_from(&auth).unwrap();
    assert_eq!(typed.value, U256::from(10000u64));
    assert_eq!(typed.valid_before, U256::from(1745323985u64));

    let mut bad = auth.clone();
    bad.value = "-1".to_string();
    assert!(eip712::TransferAuthorization::try_from(&bad).is_err());
}

#[test]
fn test_signed_authorization_recovers_payer() {
    let key = signature::generate_private_key();
    let payer = signature::address_from_secret_key(&key);
    let req = base_sepolia_requirements();
    let domain = eip712::Domain::for_requirements(&req).unwrap();

    let authorization = eip712::TransferAuthorization {
        from: payer,
        to: eip712::parse_address(&req.pay_to).unwrap(),
        value: U256::from(10000u64),
        valid_after: U256::from(1_000u64),
        valid_before: U256::from(2_000u64),
        nonce: eip712::resource_binding_nonce(&req.resource, &H256::repeat_byte(7)),
    };
    let digest = eip712::transfer_with_authorization_hash(&domain, &authorization);
    let sig = signature::sign_message_hash(digest, &key).unwrap();

    assert_eq!(signature::recover_signer(&sig, digest).unwrap(), payer);

    // Any field change moves the digest
    let mut tampered = authorization;
    tampered.value = U256::from(1u64);
    let tampered_digest = eip712::transfer_with_authorization_hash(&domain, &tampered);
    assert_ne!(signature::recover_signer(&sig, tampered_digest).unwrap(), payer);
}

#[test]
fn test_jwt_bearer() {
    let creds = jwt::CdpCredentials::new("test_key", "test_secret");
    let token = creds
        .bearer("post", "https://api.cdp.coinbase.com", "/platform/v2/x402/verify")
        .unwrap();
    assert!(token.starts_with("Bearer "));
    assert_eq!(token.matches('.').count(), 2);
}

#[test]
fn test_jwt_requires_credentials() {
    let creds = jwt::CdpCredentials::new("", "");
    assert!(creds.generate_jwt("GET", "host", "/").is_err());
}
