//! Coinbase CDP facilitator preset

use crate::crypto::jwt::CdpCredentials;
use crate::types::{AuthHeaders, FacilitatorConfig};
use crate::{Result, X402Error};
use std::collections::HashMap;

/// Coinbase facilitator base URL
pub const COINBASE_FACILITATOR_BASE_URL: &str = "https://api.cdp.coinbase.com";
/// Coinbase facilitator v2 route
pub const COINBASE_FACILITATOR_V2_ROUTE: &str = "/platform/v2/x402";

/// Per-endpoint bearer headers for the CDP facilitator
///
/// Credentials fall back to `CDP_API_KEY_ID` / `CDP_API_KEY_SECRET` when empty, read
/// at call time so rotated keys take effect without a restart.
pub fn create_auth_headers(
    api_key_id: &str,
    api_key_secret: &str,
) -> impl Fn() -> Result<AuthHeaders> + Send + Sync {
    let explicit = CdpCredentials::new(api_key_id, api_key_secret);
    let has_explicit = !api_key_id.is_empty() && !api_key_secret.is_empty();

    move || {
        let credentials = if has_explicit {
            explicit.clone()
        } else {
            CdpCredentials::from_env().ok_or_else(|| {
                X402Error::config(
                    "Missing credentials: CDP_API_KEY_ID and CDP_API_KEY_SECRET must be set",
                )
            })?
        };

        let correlation = create_correlation_header();
        let mut headers = HashMap::new();

        for (endpoint, method) in [("verify", "POST"), ("settle", "POST"), ("supported", "GET")] {
            let path = format!("{}/{}", COINBASE_FACILITATOR_V2_ROUTE, endpoint);
            let token = credentials.bearer(method, COINBASE_FACILITATOR_BASE_URL, &path)?;

            let mut endpoint_headers = HashMap::new();
            endpoint_headers.insert("Authorization".to_string(), token);
            endpoint_headers.insert("Correlation-Context".to_string(), correlation.clone());
            headers.insert(endpoint.to_string(), endpoint_headers);
        }

        Ok(headers)
    }
}

/// Facilitator config pointing at Coinbase with JWT auth
pub fn create_facilitator_config(api_key_id: &str, api_key_secret: &str) -> FacilitatorConfig {
    FacilitatorConfig::new(format!(
        "{}{}",
        COINBASE_FACILITATOR_BASE_URL, COINBASE_FACILITATOR_V2_ROUTE
    ))
    .with_auth_headers(Box::new(create_auth_headers(api_key_id, api_key_secret)))
}

/// Coinbase config reading credentials from the environment
pub fn coinbase_config_from_env() -> FacilitatorConfig {
    create_facilitator_config("", "")
}

fn create_correlation_header() -> String {
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

    let data = [
        ("sdk_language", "rust"),
        ("source", "x402-relay"),
        ("source_version", crate::VERSION),
    ];

    data.iter()
        .map(|(key, value)| format!("{}={}", key, utf8_percent_encode(value, NON_ALPHANUMERIC)))
        .collect::<Vec<_>>()
        .join(",")
}
