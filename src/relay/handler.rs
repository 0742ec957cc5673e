//! Relay as an axum endpoint

use super::{Relay, RelayRequest};
use crate::X402Error;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

/// `POST /api/relay`
pub fn router(relay: Relay) -> Router {
    Router::new()
        .route("/api/relay", post(relay_handler))
        .with_state(relay)
}

/// Relay one call; the response status mirrors the downstream status
pub async fn relay_handler(
    State(relay): State<Relay>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return X402Error::invalid_request(rejection.body_text()).into_response(),
    };

    match relay.execute(request).await {
        Ok(relayed) => {
            let status = StatusCode::from_u16(relayed.status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(relayed)).into_response()
        }
        Err(e) => {
            tracing::warn!(code = e.error_code(), error = %e, "Relay call failed");
            e.into_response()
        }
    }
}
