//! Common constants for networks, schemes and headers

/// Common network identifiers
pub mod networks {
    /// Base mainnet
    pub const BASE_MAINNET: &str = "base";
    /// Base Sepolia testnet
    pub const BASE_SEPOLIA: &str = "base-sepolia";
    /// Avalanche mainnet
    pub const AVALANCHE_MAINNET: &str = "avalanche";
    /// Avalanche Fuji testnet
    pub const AVALANCHE_FUJI: &str = "avalanche-fuji";

    /// Get USDC contract address for a network
    pub fn get_usdc_address(network: &str) -> Option<&'static str> {
        match network {
            BASE_MAINNET => Some("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            BASE_SEPOLIA => Some("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
            AVALANCHE_MAINNET => Some("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
            AVALANCHE_FUJI => Some("0x5425890298aed601595a70AB815c96711a31Bc65"),
            _ => None,
        }
    }

    /// Check if a network is supported
    pub fn is_supported(network: &str) -> bool {
        matches!(
            network,
            BASE_MAINNET | BASE_SEPOLIA | AVALANCHE_MAINNET | AVALANCHE_FUJI
        )
    }

    /// Get all supported networks
    pub fn all_supported() -> Vec<&'static str> {
        vec![
            BASE_MAINNET,
            BASE_SEPOLIA,
            AVALANCHE_MAINNET,
            AVALANCHE_FUJI,
        ]
    }
}

/// Payment schemes
pub mod schemes {
    /// Exact payment scheme (EIP-3009 transfer with authorization)
    pub const EXACT: &str = "exact";
}

/// HTTP header names used by the handshake
///
/// Header names are case-insensitive on the wire, but peers in the wild disagree on
/// casing when headers travel inside JSON maps, so both spellings are kept.
pub mod headers {
    /// Canonical request header carrying the payment proof
    pub const X_PAYMENT: &str = "X-PAYMENT";
    /// Lowercase spelling emitted by some SDKs
    pub const X_PAYMENT_LOWER: &str = "x-payment";
    /// Canonical response header carrying the settlement confirmation
    pub const X_PAYMENT_RESPONSE: &str = "X-PAYMENT-RESPONSE";
    /// Lowercase spelling of the settlement header
    pub const X_PAYMENT_RESPONSE_LOWER: &str = "x-payment-response";

    /// Map any casing of a payment header name onto its canonical form
    pub fn canonical_name(name: &str) -> Option<&'static str> {
        if name.eq_ignore_ascii_case(X_PAYMENT) {
            Some(X_PAYMENT)
        } else if name.eq_ignore_ascii_case(X_PAYMENT_RESPONSE) {
            Some(X_PAYMENT_RESPONSE)
        } else {
            None
        }
    }
}

/// Default proof validity window in seconds
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u32 = 60;

/// How far `validAfter` is backdated to tolerate clock skew between payer and verifier
pub const VALID_AFTER_SKEW_SECONDS: i64 = 600;

/// How far a payer's clock may run ahead of the verifier's when `validBefore` is checked
pub const VALID_BEFORE_SKEW_SECONDS: u32 = 30;
