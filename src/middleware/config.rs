//! Route price table
//!
//! Maps request paths to what they cost. Loaded once at startup and read-only
//! afterwards. Patterns ending in `*` match by prefix; everything else matches exactly.
//! An exact match always beats a prefix match, and the longest prefix wins among
//! prefixes.
//!
//! ```json
//! {
//!   "payTo": "0x209693bc6afc0c5328ba36faf03c514ef312287c",
//!   "routes": {
//!     "/api/summarize": { "price": "$0.01", "network": "base-sepolia", "description": "Text summarization service" },
//!     "/api/premium/*": { "price": "0.05", "network": "base", "description": "Premium API", "maxTimeoutSeconds": 120 }
//!   }
//! }
//! ```

use crate::crypto::eip712;
use crate::types::{schemes, NetworkConfig, PaymentRequirements, DEFAULT_MAX_TIMEOUT_SECONDS};
use crate::{Result, X402Error};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

/// One route as written in configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RouteConfig {
    /// Decimal USD price, leading `$` optional
    pub price: String,
    pub network: String,
    pub description: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub max_timeout_seconds: Option<u32>,
    /// Overrides the table-wide recipient
    #[serde(default)]
    pub pay_to: Option<String>,
}

impl RouteConfig {
    pub fn new(
        price: impl Into<String>,
        network: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            price: price.into(),
            network: network.into(),
            description: description.into(),
            mime_type: None,
            max_timeout_seconds: None,
            pay_to: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_max_timeout_seconds(mut self, seconds: u32) -> Self {
        self.max_timeout_seconds = Some(seconds);
        self
    }

    pub fn with_pay_to(mut self, pay_to: impl Into<String>) -> Self {
        self.pay_to = Some(pay_to.into());
        self
    }
}

/// The whole table as written in configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RouteTableConfig {
    #[serde(default)]
    pub pay_to: Option<String>,
    #[serde(default)]
    pub routes: BTreeMap<String, RouteConfig>,
}

impl RouteTableConfig {
    pub fn new(pay_to: impl Into<String>) -> Self {
        Self {
            pay_to: Some(pay_to.into()),
            routes: BTreeMap::new(),
        }
    }

    pub fn with_route(mut self, pattern: impl Into<String>, route: RouteConfig) -> Self {
        self.routes.insert(pattern.into(), route);
        self
    }
}

/// A validated, priced route
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePrice {
    pub pattern: String,
    /// Price in whole asset units (USD for USDC)
    pub price: Decimal,
    /// Price in the asset's smallest unit
    pub max_amount_required: String,
    pub network: NetworkConfig,
    pub description: String,
    pub mime_type: String,
    pub max_timeout_seconds: u32,
    pub pay_to: String,
}

impl RoutePrice {
    /// The requirement a client must satisfy to fetch `resource` through this route
    pub fn requirements(&self, resource: impl Into<String>) -> PaymentRequirements {
        let mut requirements = PaymentRequirements::new(
            schemes::EXACT,
            self.network.name.clone(),
            self.max_amount_required.clone(),
            self.network.usdc_contract.clone(),
            self.pay_to.clone(),
            resource,
            self.description.clone(),
        );
        requirements.mime_type = self.mime_type.clone();
        requirements.max_timeout_seconds = self.max_timeout_seconds;
        requirements.set_usdc_info(&self.network);
        requirements
    }
}

/// Path to price lookup
#[derive(Debug, Clone, Default)]
pub struct RoutePriceTable {
    exact: HashMap<String, RoutePrice>,
    /// Sorted longest prefix first
    prefixes: Vec<(String, RoutePrice)>,
}

impl RoutePriceTable {
    /// Validate a table, converting prices into smallest units
    pub fn from_config(config: RouteTableConfig) -> Result<Self> {
        let mut table = Self::default();

        for (pattern, route) in config.routes {
            let price = price_route(&pattern, route, config.pay_to.as_deref())?;
            match pattern.strip_suffix('*') {
                Some(prefix) => table.prefixes.push((prefix.to_string(), price)),
                None => {
                    table.exact.insert(pattern, price);
                }
            }
        }

        table
            .prefixes
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        Ok(table)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RouteTableConfig = serde_json::from_str(json)
            .map_err(|e| X402Error::config(format!("Invalid route table: {}", e)))?;
        Self::from_config(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            X402Error::config(format!("Cannot read route table {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Price for a request path, if the path is protected
    pub fn lookup(&self, path: &str) -> Option<&RoutePrice> {
        if let Some(price) = self.exact.get(path) {
            return Some(price);
        }
        self.prefixes
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, price)| price)
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn price_route(pattern: &str, route: RouteConfig, default_pay_to: Option<&str>) -> Result<RoutePrice> {
    if !pattern.starts_with('/') {
        return Err(X402Error::config(format!(
            "Route pattern {:?} must start with '/'",
            pattern
        )));
    }

    let network = NetworkConfig::from_name(&route.network).ok_or_else(|| {
        X402Error::config(format!(
            "Route {}: unsupported network {:?}",
            pattern, route.network
        ))
    })?;

    let price = Decimal::from_str(route.price.trim().trim_start_matches('$')).map_err(|_| {
        X402Error::config(format!("Route {}: invalid price {:?}", pattern, route.price))
    })?;
    if price.is_sign_negative() {
        return Err(X402Error::config(format!(
            "Route {}: price must not be negative",
            pattern
        )));
    }

    let smallest = price
        .checked_mul(Decimal::from(10u64.pow(network.usdc_decimals)))
        .ok_or_else(|| X402Error::config(format!("Route {}: price overflows", pattern)))?;
    if !smallest.fract().is_zero() {
        return Err(X402Error::config(format!(
            "Route {}: price {} is finer than {} decimals",
            pattern, route.price, network.usdc_decimals
        )));
    }

    let pay_to = route
        .pay_to
        .as_deref()
        .or(default_pay_to)
        .ok_or_else(|| X402Error::config(format!("Route {}: no payTo address", pattern)))?
        .to_lowercase();
    eip712::parse_address(&pay_to)
        .map_err(|_| X402Error::config(format!("Route {}: invalid payTo {}", pattern, pay_to)))?;

    Ok(RoutePrice {
        pattern: pattern.to_string(),
        price,
        max_amount_required: smallest.trunc().normalize().to_string(),
        network,
        description: route.description,
        mime_type: route
            .mime_type
            .unwrap_or_else(|| "application/json".to_string()),
        max_timeout_seconds: route
            .max_timeout_seconds
            .unwrap_or(DEFAULT_MAX_TIMEOUT_SECONDS),
        pay_to,
    })
}
