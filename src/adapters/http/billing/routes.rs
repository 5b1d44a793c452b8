//! Axum router configuration for the billing webhook.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::handlers::{
    handle_stripe_webhook, health, webhook_preflight, BillingAppState, WebhookApiError,
};
use crate::config::ServerConfig;
use crate::domain::billing::WebhookError;

/// Create the webhook routes.
///
/// # Routes
/// - `POST /webhooks/stripe` - Handle Stripe webhooks
/// - `OPTIONS /webhooks/stripe` - Preflight
/// - `GET /health` - Liveness probe
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route(
            "/webhooks/stripe",
            post(handle_stripe_webhook).options(webhook_preflight),
        )
        .route("/health", get(health))
}

/// Permissive CORS for the webhook endpoint.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
            HeaderName::from_static("stripe-signature"),
        ])
}

/// An expired request deadline is a server-side failure; the sender must redeliver.
async fn deadline_as_server_error(response: Response) -> Response {
    if response.status() != StatusCode::REQUEST_TIMEOUT {
        return response;
    }
    tracing::error!("Request deadline elapsed before processing finished");
    WebhookApiError::from(WebhookError::Timeout("request deadline")).into_response()
}

/// Create the complete service router with its middleware stack.
///
/// Layers, outermost first: request id, tracing, deadline status mapping,
/// request deadline, CORS, body size limit.
pub fn billing_router(state: BillingAppState, server: &ServerConfig) -> Router {
    billing_routes()
        .layer(DefaultBodyLimit::max(server.body_limit_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(middleware::map_response(deadline_as_server_error))
                .layer(TimeoutLayer::new(server.request_timeout()))
                .layer(cors_layer()),
        )
        .with_state(state)
}
