//! # x402 payment handshake and relay
//!
//! A Rust implementation of the x402 pay-per-call protocol: a server prices a route by
//! answering `402 Payment Required` with machine-readable payment requirements, the
//! client signs a payment proof and retries with it in `X-PAYMENT`, and a facilitator
//! verifies and settles the proof before the resource is served.
//!
//! ## Quick Start
//!
//! ### Protecting a route
//!
//! ```rust,no_run
//! use axum::{routing::post, Router};
//! use x402_relay::facilitator::FacilitatorClient;
//! use x402_relay::middleware::{payment_middleware, PaymentMiddleware, RouteConfig, RoutePriceTable, RouteTableConfig};
//! use x402_relay::types::FacilitatorConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let table = RoutePriceTable::from_config(
//!         RouteTableConfig::new("0x209693Bc6afc0C5328bA36FaF03C514EF312287C").with_route(
//!             "/api/summarize",
//!             RouteConfig::new("$0.01", "base-sepolia", "Text summarization service"),
//!         ),
//!     )?;
//!     let facilitator = FacilitatorClient::new(FacilitatorConfig::new("http://localhost:4020"))?;
//!
//!     let app = Router::new()
//!         .route("/api/summarize", post(|| async { "summary" }))
//!         .layer(axum::middleware::from_fn_with_state(
//!             PaymentMiddleware::new(table, facilitator),
//!             payment_middleware,
//!         ));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Paying for a route
//!
//! ```rust,no_run
//! use x402_relay::{signer::LocalSigner, X402Client};
//!
//! # async fn example() -> x402_relay::Result<()> {
//! let client = X402Client::new(LocalSigner::random("base-sepolia"))?;
//! let paid = client
//!     .post_json("http://localhost:3000/api/summarize", &serde_json::json!({ "input": "..." }))
//!     .await?;
//! println!("status {}, settled: {:?}", paid.response.status(), paid.settlement);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`types`**: wire data model
//! - **`codec`**: `X-PAYMENT` / `X-PAYMENT-RESPONSE` header codecs
//! - **`crypto`**: EIP-712 hashing, secp256k1 signatures, bearer tokens
//! - **`signer`**: signing identities and proof construction
//! - **`client`**: the payment interceptor
//! - **`middleware`**: the challenge responder and route price table
//! - **`facilitator`**: facilitator trait, HTTP client, in-process facilitator
//! - **`facilitator_storage`**: replay-protection nonce ledger
//! - **`relay`**: paid calls on behalf of custodied wallets
//! - **`retry`**: retry with exponential backoff
//! - **`config`** / **`server`**: process configuration and serving
//!
//! ## Optional Features
//!
//! - **`axum`** (default): middleware, facilitator router, relay handler, server helpers
//! - **`redis`**: Redis-backed nonce ledger
//!
//! ## Networks
//!
//! USDC via EIP-3009 `transferWithAuthorization` on Base, Base Sepolia, Avalanche and
//! Avalanche Fuji.

pub mod client;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod facilitator;
pub mod facilitator_storage;
pub mod middleware;
pub mod relay;
pub mod retry;
#[cfg(feature = "axum")]
pub mod server;
pub mod signer;
pub mod types;

pub use client::X402Client;
pub use error::{Result, X402Error};
pub use types::*;

/// Current version of the x402 library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
