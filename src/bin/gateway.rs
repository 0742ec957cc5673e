//! X402 Gateway
//!
//! Demo resource server: `POST /api/summarize` is priced through the route table and
//! `POST /api/relay` pays downstream x402 resources on behalf of custodied wallets.
//!
//! See [`x402_relay::config::GatewayConfig`] for the environment it reads.

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use x402_relay::{
    config::GatewayConfig,
    facilitator::FacilitatorClient,
    middleware::{payment_middleware, PaymentMiddleware},
    relay::{self, InMemoryCustody, Relay, RemoteCustody, WalletCustody},
    server, Result,
};

const SUMMARY_SENTENCES: usize = 3;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SummarizeRequest {
    input: String,
}

#[derive(Debug, Serialize)]
struct SummarizeResponse {
    summary: String,
}

/// Leading sentences of the input, whitespace collapsed
fn summarize(input: &str, sentences: usize) -> String {
    let text = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut end = text.len();
    let mut seen = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            seen += 1;
            if seen == sentences {
                end = i + c.len_utf8();
                break;
            }
        }
    }
    text[..end].to_string()
}

async fn summarize_handler(
    Json(request): Json<SummarizeRequest>,
) -> std::result::Result<Json<SummarizeResponse>, (StatusCode, &'static str)> {
    if request.input.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "input must not be empty"));
    }
    Ok(Json(SummarizeResponse {
        summary: summarize(&request.input, SUMMARY_SENTENCES),
    }))
}

async fn build_custody(config: &GatewayConfig) -> Result<Arc<dyn WalletCustody>> {
    match &config.wallet_custody_url {
        Some(url) => {
            let mut custody = RemoteCustody::new(url)?;
            if let Some(credentials) = &config.cdp_credentials {
                custody = custody.with_credentials(credentials.clone());
            }
            tracing::info!(url = %url, "Using remote wallet custody");
            Ok(Arc::new(custody))
        }
        None => {
            let custody = InMemoryCustody::new();
            let wallet = custody.create_wallet("base-sepolia").await;
            tracing::info!(
                wallet_id = %wallet.id,
                address = %wallet.address,
                "Using in-memory wallet custody with a demo session wallet"
            );
            Ok(Arc::new(custody))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    server::init_tracing();

    let config = GatewayConfig::from_env()?;

    let table = config.route_table()?;
    let facilitator = FacilitatorClient::new(config.facilitator_config())?;
    tracing::info!(
        facilitator = facilitator.url(),
        routes = table.len(),
        "Loaded route price table"
    );

    let mut payments = PaymentMiddleware::new(table, facilitator);
    if let Some(root) = &config.resource_root_url {
        payments = payments.with_resource_root_url(root);
    }

    let mut relay = Relay::with_shared_custody(build_custody(&config).await?)?;
    if let Some(base_url) = &config.relay_base_url {
        relay = relay.with_base_url(base_url)?;
    }

    let app = Router::new()
        .route("/api/summarize", post(summarize_handler))
        .layer(axum::middleware::from_fn_with_state(
            payments,
            payment_middleware,
        ))
        .merge(relay::router(relay))
        .route("/health", get(|| async { "ok" }));

    server::serve(app, &config.bind_address).await
}
