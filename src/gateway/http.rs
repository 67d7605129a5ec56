//! HTTP surface of the gateway.
//!
//! Routes:
//! - `POST /device/:id` → 202 Accepted, body `started device {id}`
//! - `DELETE /device/:id` → 202 Accepted, body `stopped device {id}`
//!
//! Failures map onto the gateway's binary outcome: a timeout becomes
//! 504 Gateway Timeout, an unavailable entity becomes 503 Service
//! Unavailable, both with a small JSON body carrying a stable error code.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::device::CommandKind;
use crate::error::GatewayError;
use crate::gateway::Gateway;

/// JSON error body returned for failed requests.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

/// Wrapper so gateway errors can be returned straight from handlers.
struct HttpError(GatewayError);

impl From<GatewayError> for HttpError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            code: self.0.as_label().to_string(),
        });
        (status, body).into_response()
    }
}

/// Builds the device router over a gateway.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/device/:id", post(start_device).delete(stop_device))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

async fn start_device(
    State(gateway): State<Arc<Gateway>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, String), HttpError> {
    gateway.request(&id, CommandKind::Start).await?;
    Ok((StatusCode::ACCEPTED, format!("started device {id}")))
}

async fn stop_device(
    State(gateway): State<Arc<Gateway>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, String), HttpError> {
    gateway.request(&id, CommandKind::Stop).await?;
    Ok((StatusCode::ACCEPTED, format!("stopped device {id}")))
}
