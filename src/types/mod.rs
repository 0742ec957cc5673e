//! Core types for the x402 handshake
//!
//! This module defines the wire data model shared by the challenge responder, the
//! payment interceptor, the facilitator and the relay.
//!
//! - [`network`] - chain-specific details (chain id, USDC contract, decimals)
//! - [`payment`] - payment requirements, the payment proof and the 402 body
//! - [`facilitator`] - facilitator configuration, verification and settlement results
//! - [`wallet`] - session wallet handles resolved by the relay
//! - [`constants`] - networks, schemes and header names
//!
//! # Example
//!
//! ```
//! use x402_relay::types::{NetworkConfig, PaymentRequirements};
//!
//! let network = NetworkConfig::from_name("base-sepolia").unwrap();
//! let mut requirements = PaymentRequirements::new(
//!     "exact",
//!     "base-sepolia",
//!     "10000",
//!     network.usdc_contract.clone(),
//!     "0x209693bc6afc0c5328ba36faf03c514ef312287c",
//!     "https://api.example.com/api/summarize",
//!     "Text summarization service",
//! );
//! requirements.set_usdc_info(&network);
//! assert_eq!(requirements.extra_str("name"), Some("USDC"));
//! ```

pub mod constants;
pub mod facilitator;
pub mod network;
pub mod payment;
pub mod wallet;

// Re-export commonly used types
pub use constants::{
    headers, networks, schemes, DEFAULT_MAX_TIMEOUT_SECONDS, VALID_AFTER_SKEW_SECONDS,
    VALID_BEFORE_SKEW_SECONDS,
};
pub use facilitator::{
    AuthHeaders, AuthHeadersFn, AuthHeadersFnArc, AuthHeadersFnBox, FacilitatorConfig,
    FacilitatorRequest, SettlementConfirmation, SupportedKind, SupportedKinds, VerifyResponse,
};
pub use network::NetworkConfig;
pub use payment::{
    ExactEvmPayload, ExactEvmPayloadAuthorization, PaymentPayload, PaymentRequirements,
    PaymentRequirementsResponse, X402_VERSION,
};
pub use wallet::SessionWallet;
