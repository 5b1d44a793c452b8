//! Billing module - Webhook ingestion and subscription reconciliation.
//!
//! Control flow for one inbound event:
//!
//! ```text
//! raw bytes ─► StripeWebhookVerifier ─► VerifiedPayload
//!           ─► BillingEvent::decode  ─► HandlerRegistry::dispatch
//!           ─► IdentityResolver (checkout only) ─► SubscriptionReconciler
//! ```
//!
//! Only the reconciler writes subscription records.

mod identity;
mod reconciler;
mod stripe_event;
mod subscription;
mod webhook_errors;
mod webhook_processor;
mod webhook_verifier;

pub use identity::{IdentityResolver, UserIdentity};
pub use reconciler::SubscriptionReconciler;
pub use stripe_event::{
    BillingEvent, BillingEventKind, BillingEventType, CheckoutCompleted, StripeEvent,
    StripeEventData, SubscriptionChange,
};
pub use subscription::{
    StatusUpdate, SubscriptionRecord, SubscriptionStatus, SubscriptionUpsert, WriteOutcome,
};
pub use webhook_errors::{ErrorCategory, WebhookError};
pub use webhook_processor::{
    CheckoutCompletedHandler, DuplicateHandler, HandlerRegistry, SubscriptionDeletedHandler,
    SubscriptionUpdatedHandler, WebhookEventHandler, WebhookOutcome,
};
pub use webhook_verifier::{
    sign_payload, SignatureHeader, StripeWebhookVerifier, VerifiedPayload, DEFAULT_TOLERANCE_SECS,
    MAX_CLOCK_SKEW_SECS,
};

#[cfg(test)]
pub(crate) use stripe_event::StripeEventBuilder;
