//! HTTP handlers for the billing webhook.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::application::{HandleBillingWebhookCommand, HandleBillingWebhookHandler};
use crate::domain::billing::WebhookError;

use super::dto::{ErrorResponse, HealthResponse, WebhookAckResponse};

/// Header carrying the provider signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the billing routes.
///
/// Cloned per request; the handler is shared behind an `Arc`.
#[derive(Clone)]
pub struct BillingAppState {
    pub webhook_handler: Arc<HandleBillingWebhookHandler>,
}

impl BillingAppState {
    pub fn new(webhook_handler: HandleBillingWebhookHandler) -> Self {
        Self {
            webhook_handler: Arc::new(webhook_handler),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/stripe - Handle Stripe webhook events
///
/// The body is taken as raw bytes; it must reach the verifier unparsed.
pub async fn handle_stripe_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAckResponse>, WebhookApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

    let cmd = HandleBillingWebhookCommand {
        payload: body.to_vec(),
        signature,
    };

    let result = state.webhook_handler.handle(cmd).await?;

    Ok(Json(WebhookAckResponse::from(&result)))
}

/// OPTIONS /webhooks/stripe - Preflight without an `Origin` header
pub async fn webhook_preflight() -> StatusCode {
    StatusCode::OK
}

/// GET /health - Liveness probe
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts webhook errors to HTTP responses.
///
/// Only the public message leaves the process; details were logged by the
/// application handler.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorResponse::new(self.0.error_code(), self.0.public_message());
        (self.0.status_code(), Json(body)).into_response()
    }
}
