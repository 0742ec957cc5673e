//! Session wallet handle owned by a wallet-custody service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signing identity resolved by the relay; the core never manages its lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionWallet {
    pub id: String,
    pub address: String,
    pub network: String,
    pub created_at: DateTime<Utc>,
}

impl SessionWallet {
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        network: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            network: network.into(),
            created_at: Utc::now(),
        }
    }
}
