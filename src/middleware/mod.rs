//! Challenge responder
//!
//! Protects priced routes of an axum application. Each request to a path in the
//! [`RoutePriceTable`] must carry a payment proof in `X-PAYMENT`; otherwise it is
//! answered with `402 Payment Required` listing how to pay.
//!
//! - [`config`] - route price table
//! - [`payment`] - the middleware itself (requires the `axum` feature)
//!
//! # Payment Flow
//!
//! 1. Request to an unpriced path → passed through untouched
//! 2. Request without a proof → 402 with `accepts`
//! 3. Request with a proof → facilitator verify; rejection → 402 with the reason
//! 4. Proof valid → handler runs
//! 5. Handler succeeds → facilitator settle → `X-PAYMENT-RESPONSE` on the response
//!
//! Facilitator outages surface as 503/502, never as a 402 and never as free access.
//!
//! # Example
//!
//! ```no_run
//! use axum::{routing::post, Router};
//! use x402_relay::facilitator::FacilitatorClient;
//! use x402_relay::middleware::{payment_middleware, PaymentMiddleware, RouteConfig, RoutePriceTable, RouteTableConfig};
//! use x402_relay::types::FacilitatorConfig;
//!
//! # fn example() -> x402_relay::Result<()> {
//! let table = RoutePriceTable::from_config(
//!     RouteTableConfig::new("0x209693bc6afc0c5328ba36faf03c514ef312287c").with_route(
//!         "/api/summarize",
//!         RouteConfig::new("$0.01", "base-sepolia", "Text summarization service"),
//!     ),
//! )?;
//! let facilitator = FacilitatorClient::new(FacilitatorConfig::new("http://localhost:4020"))?;
//! let middleware = PaymentMiddleware::new(table, facilitator);
//!
//! let app: Router = Router::new()
//!     .route("/api/summarize", post(|| async { "summary" }))
//!     .layer(axum::middleware::from_fn_with_state(middleware, payment_middleware));
//! # Ok(())
//! # }
//! ```

pub mod config;
#[cfg(feature = "axum")]
pub mod payment;


pub use config::{RouteConfig, RoutePrice, RoutePriceTable, RouteTableConfig};
#[cfg(feature = "axum")]
pub use payment::{payment_middleware, PaymentMiddleware, PaymentResult};
