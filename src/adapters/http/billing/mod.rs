//! HTTP adapter for the billing webhook.
//!
//! - `POST /webhooks/stripe` - Receive Stripe webhooks (signature verified)
//! - `OPTIONS /webhooks/stripe` - Cross-origin preflight
//! - `GET /health` - Liveness probe

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{BillingAppState, WebhookApiError};
pub use routes::{billing_router, billing_routes};
