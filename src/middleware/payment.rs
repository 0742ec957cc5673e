//! Challenge responder as axum middleware

use super::config::RoutePriceTable;
use crate::codec;
use crate::facilitator::Facilitator;
use crate::types::{
    headers, PaymentRequirements, PaymentRequirementsResponse, SettlementConfirmation,
};
use crate::{Result, X402Error};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// Per-route payment gate backed by a facilitator
#[derive(Clone)]
pub struct PaymentMiddleware {
    table: Arc<RoutePriceTable>,
    facilitator: Arc<dyn Facilitator>,
    resource_root_url: Option<String>,
}

impl std::fmt::Debug for PaymentMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentMiddleware")
            .field("routes", &self.table.len())
            .field("resource_root_url", &self.resource_root_url)
            .finish()
    }
}

/// Outcome of one pass through the middleware
#[derive(Debug)]
pub enum PaymentResult {
    /// Path is not priced; handler ran unchanged
    Unprotected { response: Response },
    /// Proof verified, handler succeeded, payment settled
    Success {
        response: Response,
        settlement: SettlementConfirmation,
    },
    /// No proof, or a proof that could not be decoded
    PaymentRequired { response: Response },
    /// Facilitator rejected the proof
    VerificationFailed { response: Response },
    /// Handler did not succeed, so nothing was settled
    NotSettled { response: Response },
    /// Facilitator refused to settle a verified proof
    SettlementFailed { response: Response },
}

impl IntoResponse for PaymentResult {
    fn into_response(self) -> Response {
        match self {
            Self::Unprotected { response }
            | Self::Success { response, .. }
            | Self::PaymentRequired { response }
            | Self::VerificationFailed { response }
            | Self::NotSettled { response }
            | Self::SettlementFailed { response } => response,
        }
    }
}

impl PaymentMiddleware {
    pub fn new(table: RoutePriceTable, facilitator: impl Facilitator + 'static) -> Self {
        Self::with_shared_facilitator(table, Arc::new(facilitator))
    }

    pub fn with_shared_facilitator(
        table: RoutePriceTable,
        facilitator: Arc<dyn Facilitator>,
    ) -> Self {
        Self {
            table: Arc::new(table),
            facilitator,
            resource_root_url: None,
        }
    }

    /// Public origin used to build resource URLs instead of the request's Host
    pub fn with_resource_root_url(mut self, url: impl Into<String>) -> Self {
        self.resource_root_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn table(&self) -> &RoutePriceTable {
        &self.table
    }

    /// Absolute URL of the current request
    pub fn resource_url(&self, headers: &HeaderMap, uri: &Uri) -> String {
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());

        if let Some(root) = &self.resource_root_url {
            return format!("{}{}", root, path);
        }

        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("http");
        let host = headers
            .get(axum::http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost");

        format!("{}://{}{}", scheme, host, path)
    }

    /// Gate one request: challenge, verify, run the handler, settle
    pub async fn process_payment(&self, request: Request, next: Next) -> Result<PaymentResult> {
        let Some(route) = self.table.lookup(request.uri().path()) else {
            return Ok(PaymentResult::Unprotected {
                response: next.run(request).await,
            });
        };

        let resource = self.resource_url(request.headers(), request.uri());
        let requirements = route.requirements(resource);

        let header = request
            .headers()
            .get(headers::X_PAYMENT)
            .or_else(|| request.headers().get(headers::X_PAYMENT_LOWER));

        let Some(header) = header else {
            return Ok(PaymentResult::PaymentRequired {
                response: payment_required(
                    &X402Error::NoProofSupplied.to_string(),
                    &requirements,
                    None,
                ),
            });
        };

        let decoded = header
            .to_str()
            .map_err(|_| X402Error::malformed_proof("header is not visible ASCII"))
            .and_then(codec::decode_payment);
        let payment = match decoded {
            Ok(payment) => payment,
            Err(e) => {
                tracing::warn!(resource = %requirements.resource, error = %e, "Undecodable payment proof");
                return Ok(PaymentResult::PaymentRequired {
                    response: payment_required(&e.to_string(), &requirements, None),
                });
            }
        };

        let verdict = self.facilitator.verify(&payment, &requirements).await?;
        if !verdict.is_valid {
            let reason = verdict
                .invalid_reason
                .unwrap_or_else(|| "payment verification failed".to_string());
            tracing::warn!(resource = %requirements.resource, reason = %reason, "Payment proof rejected");
            return Ok(PaymentResult::VerificationFailed {
                response: payment_required(&reason, &requirements, verdict.payer),
            });
        }

        let mut response = next.run(request).await;
        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "Handler failed, skipping settlement");
            return Ok(PaymentResult::NotSettled { response });
        }

        let settlement = self.facilitator.settle(&payment, &requirements).await?;
        if !settlement.success {
            let reason = settlement
                .error_reason
                .clone()
                .unwrap_or_else(|| "settlement failed".to_string());
            tracing::warn!(resource = %requirements.resource, reason = %reason, "Settlement refused");
            return Ok(PaymentResult::SettlementFailed {
                response: payment_required(&reason, &requirements, settlement.payer),
            });
        }

        let encoded = codec::encode_settlement(&settlement)?;
        let value = HeaderValue::from_str(&encoded)
            .map_err(|_| X402Error::config("Settlement header is not a valid header value"))?;
        response
            .headers_mut()
            .insert(headers::X_PAYMENT_RESPONSE, value);

        tracing::info!(
            resource = %requirements.resource,
            transaction = %settlement.transaction,
            "Paid request served"
        );
        Ok(PaymentResult::Success {
            response,
            settlement,
        })
    }
}

fn payment_required(
    error: &str,
    requirements: &PaymentRequirements,
    payer: Option<String>,
) -> Response {
    let body = PaymentRequirementsResponse::new(error, vec![requirements.clone()]).with_payer(payer);
    (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
}

/// Axum middleware function, for `axum::middleware::from_fn_with_state`
pub async fn payment_middleware(
    State(middleware): State<PaymentMiddleware>,
    request: Request,
    next: Next,
) -> Response {
    match middleware.process_payment(request, next).await {
        Ok(result) => result.into_response(),
        Err(e) => e.into_response(),
    }
}
