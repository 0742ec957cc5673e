//! Process configuration from the environment
//!
//! Both binaries read their settings from environment variables, optionally loaded
//! from a `.env` file. Values are looked up through a closure so tests can supply a
//! map instead of touching the process environment.

use crate::crypto::CdpCredentials;
use crate::facilitator::{coinbase, DEFAULT_FACILITATOR_URL};
use crate::middleware::{RouteConfig, RoutePriceTable, RouteTableConfig};
use crate::types::FacilitatorConfig;
use crate::{Result, X402Error};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_GATEWAY_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_FACILITATOR_ADDRESS: &str = "0.0.0.0:4020";
const DEFAULT_FACILITATOR_TIMEOUT_SECS: u64 = 10;

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Settings of the `x402-gateway` resource server
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_address: String,
    pub facilitator_url: String,
    pub facilitator_timeout: Duration,
    /// JSON route table; the built-in `/api/summarize` table is used when unset
    pub route_table_path: Option<PathBuf>,
    pub pay_to: Option<String>,
    pub resource_root_url: Option<String>,
    pub relay_base_url: Option<String>,
    /// Remote custody service; wallets are held in memory when unset
    pub wallet_custody_url: Option<String>,
    pub cdp_credentials: Option<CdpCredentials>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let facilitator_timeout = match non_empty(&lookup, "FACILITATOR_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(secs.parse().map_err(|_| {
                X402Error::config(format!("FACILITATOR_TIMEOUT_SECS is not a number: {}", secs))
            })?),
            None => Duration::from_secs(DEFAULT_FACILITATOR_TIMEOUT_SECS),
        };

        let cdp_credentials = match (
            non_empty(&lookup, "CDP_API_KEY_ID"),
            non_empty(&lookup, "CDP_API_KEY_SECRET"),
        ) {
            (Some(id), Some(secret)) => Some(CdpCredentials::new(id, secret)),
            _ => None,
        };

        Ok(Self {
            bind_address: non_empty(&lookup, "BIND_ADDRESS")
                .unwrap_or_else(|| DEFAULT_GATEWAY_ADDRESS.to_string()),
            facilitator_url: non_empty(&lookup, "FACILITATOR_URL")
                .unwrap_or_else(|| DEFAULT_FACILITATOR_URL.to_string()),
            facilitator_timeout,
            route_table_path: non_empty(&lookup, "ROUTE_TABLE_PATH").map(PathBuf::from),
            pay_to: non_empty(&lookup, "PAY_TO"),
            resource_root_url: non_empty(&lookup, "RESOURCE_ROOT_URL"),
            relay_base_url: non_empty(&lookup, "RELAY_BASE_URL"),
            wallet_custody_url: non_empty(&lookup, "WALLET_CUSTODY_URL"),
            cdp_credentials,
        })
    }

    /// Facilitator client settings; the Coinbase facilitator gets signed auth headers
    pub fn facilitator_config(&self) -> FacilitatorConfig {
        match &self.cdp_credentials {
            Some(credentials)
                if self
                    .facilitator_url
                    .starts_with(coinbase::COINBASE_FACILITATOR_BASE_URL) =>
            {
                let mut config = coinbase::create_facilitator_config(
                    &credentials.key_id,
                    credentials.key_secret(),
                );
                config.url = self.facilitator_url.trim_end_matches('/').to_string();
                config.with_timeout(self.facilitator_timeout)
            }
            _ => FacilitatorConfig::new(&self.facilitator_url)
                .with_timeout(self.facilitator_timeout),
        }
    }

    /// Route table from `ROUTE_TABLE_PATH`, or the demo table pricing `/api/summarize`
    pub fn route_table(&self) -> Result<RoutePriceTable> {
        if let Some(path) = &self.route_table_path {
            return RoutePriceTable::from_file(path);
        }

        let pay_to = self.pay_to.as_deref().ok_or_else(|| {
            X402Error::config("PAY_TO must be set when ROUTE_TABLE_PATH is not")
        })?;
        RoutePriceTable::from_config(RouteTableConfig::new(pay_to).with_route(
            "/api/summarize",
            RouteConfig::new("$0.01", "base-sepolia", "Text summarization service"),
        ))
    }
}

/// Nonce ledger backend of the `x402-facilitator` binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Redis {
        url: String,
        key_prefix: Option<String>,
    },
}

/// Settings of the `x402-facilitator` binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacilitatorServerConfig {
    pub bind_address: String,
    pub storage: StorageBackend,
}

impl FacilitatorServerConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let storage = match non_empty(&lookup, "STORAGE_BACKEND").as_deref() {
            None | Some("memory") => StorageBackend::Memory,
            Some("redis") => StorageBackend::Redis {
                url: non_empty(&lookup, "REDIS_URL")
                    .unwrap_or_else(|| "redis://localhost:6379".to_string()),
                key_prefix: non_empty(&lookup, "REDIS_KEY_PREFIX"),
            },
            Some(other) => {
                return Err(X402Error::config(format!(
                    "STORAGE_BACKEND must be 'memory' or 'redis', got {:?}",
                    other
                )))
            }
        };

        Ok(Self {
            bind_address: non_empty(&lookup, "BIND_ADDRESS")
                .unwrap_or_else(|| DEFAULT_FACILITATOR_ADDRESS.to_string()),
            storage,
        })
    }
}
