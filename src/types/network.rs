//! Network configuration types

/// Chain-specific details needed to price and sign payments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Chain ID for the network
    pub chain_id: u64,
    /// USDC contract address
    pub usdc_contract: String,
    /// USDC EIP-712 domain name
    pub usdc_name: String,
    /// Number of decimals of the USDC token
    pub usdc_decimals: u32,
    /// Network name
    pub name: String,
    /// Whether this is a testnet
    pub is_testnet: bool,
}

impl NetworkConfig {
    fn usdc(chain_id: u64, name: &str, usdc_name: &str, is_testnet: bool) -> Option<Self> {
        let usdc_contract = super::networks::get_usdc_address(name)?;
        Some(Self {
            chain_id,
            usdc_contract: usdc_contract.to_string(),
            usdc_name: usdc_name.to_string(),
            usdc_decimals: 6,
            name: name.to_string(),
            is_testnet,
        })
    }

    /// Get network config by name
    pub fn from_name(name: &str) -> Option<Self> {
        use super::networks::*;

        match name {
            BASE_MAINNET => Self::usdc(8453, name, "USD Coin", false),
            BASE_SEPOLIA => Self::usdc(84532, name, "USDC", true),
            AVALANCHE_MAINNET => Self::usdc(43114, name, "USD Coin", false),
            AVALANCHE_FUJI => Self::usdc(43113, name, "USD Coin", true),
            _ => None,
        }
    }
}
