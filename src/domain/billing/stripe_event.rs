//! Stripe webhook event types.
//!
//! Defines the structures for parsing Stripe webhook payloads and the
//! typed [`BillingEvent`] the rest of the service works with.
//! Only fields relevant to reconciliation are captured.

use serde::{Deserialize, Serialize};

use super::webhook_errors::WebhookError;
use super::webhook_verifier::VerifiedPayload;
use crate::domain::foundation::Timestamp;

/// Stripe webhook event envelope (simplified).
///
/// Additional fields from Stripe's full event schema are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    pub created: i64,

    /// Object containing event-specific data.
    pub data: StripeEventData,

    /// Whether this is a live mode event (vs test mode).
    #[serde(default)]
    pub livemode: bool,

    /// API version used to render this event. Null for some account events.
    #[serde(default)]
    pub api_version: Option<String>,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object that triggered the event (polymorphic based on event type).
    pub object: serde_json::Value,
}

/// Known Stripe event types that we reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BillingEventType {
    /// Checkout session completed successfully.
    CheckoutSessionCompleted,
    /// Customer subscription was updated.
    CustomerSubscriptionUpdated,
    /// Customer subscription was deleted.
    CustomerSubscriptionDeleted,
    /// Unknown or unhandled event type.
    Unknown,
}

impl BillingEventType {
    /// Parse event type from string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            _ => Self::Unknown,
        }
    }

    /// Convert to the Stripe event type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CustomerSubscriptionUpdated => "customer.subscription.updated",
            Self::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            Self::Unknown => "unknown",
        }
    }
}

/// Fields of a completed checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCompleted {
    pub customer_email: Option<String>,
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: Option<String>,
}

/// Fields of a subscription update or deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChange {
    pub provider_subscription_id: String,
    pub provider_customer_id: Option<String>,
    /// Provider status vocabulary (`active`, `past_due`, `trialing`, ...).
    pub status: Option<String>,
}

/// Kind-specific content of a billing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEventKind {
    SessionCompleted(CheckoutCompleted),
    SubscriptionUpdated(SubscriptionChange),
    SubscriptionDeleted(SubscriptionChange),
    /// A kind we do not reconcile. The object is never inspected.
    Unknown,
}

impl BillingEventKind {
    /// Dispatch key for this kind.
    pub fn event_type(&self) -> BillingEventType {
        match self {
            Self::SessionCompleted(_) => BillingEventType::CheckoutSessionCompleted,
            Self::SubscriptionUpdated(_) => BillingEventType::CustomerSubscriptionUpdated,
            Self::SubscriptionDeleted(_) => BillingEventType::CustomerSubscriptionDeleted,
            Self::Unknown => BillingEventType::Unknown,
        }
    }
}

/// A verified, decoded billing event.
#[derive(Debug, Clone)]
pub struct BillingEvent {
    /// Provider event id, unique per event and stable across redeliveries.
    pub provider_event_id: String,
    /// Wire type string, kept for logging unknown kinds.
    pub event_type: String,
    /// Provider-side creation time. Orders writes for the same key.
    pub created: Timestamp,
    pub livemode: bool,
    /// The exact bytes that were signed.
    pub raw_payload: Vec<u8>,
    pub kind: BillingEventKind,
}

impl BillingEvent {
    /// Decodes a verified payload into a typed event.
    ///
    /// # Errors
    ///
    /// `MalformedPayload` if the envelope is invalid or a reconciled kind
    /// lacks its required fields. Unknown kinds always decode.
    pub fn decode(payload: VerifiedPayload) -> Result<Self, WebhookError> {
        let envelope: StripeEvent = serde_json::from_slice(payload.as_bytes())
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        if envelope.id.trim().is_empty() {
            return Err(WebhookError::MalformedPayload("empty event id".to_string()));
        }

        let created = Timestamp::from_unix(envelope.created)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        let kind = match BillingEventType::from_str(&envelope.event_type) {
            BillingEventType::CheckoutSessionCompleted => {
                let session: CheckoutSessionObject = decode_object(&envelope)?;
                BillingEventKind::SessionCompleted(session.into())
            }
            BillingEventType::CustomerSubscriptionUpdated => {
                let subscription: SubscriptionObject = decode_object(&envelope)?;
                BillingEventKind::SubscriptionUpdated(subscription.try_into()?)
            }
            BillingEventType::CustomerSubscriptionDeleted => {
                let subscription: SubscriptionObject = decode_object(&envelope)?;
                BillingEventKind::SubscriptionDeleted(subscription.try_into()?)
            }
            BillingEventType::Unknown => BillingEventKind::Unknown,
        };

        Ok(BillingEvent {
            provider_event_id: envelope.id,
            event_type: envelope.event_type,
            created,
            livemode: envelope.livemode,
            raw_payload: payload.into_bytes(),
            kind,
        })
    }

    /// Parse the event kind into its dispatch key.
    pub fn parsed_type(&self) -> BillingEventType {
        self.kind.event_type()
    }
}

fn decode_object<T: serde::de::DeserializeOwned>(envelope: &StripeEvent) -> Result<T, WebhookError> {
    T::deserialize(&envelope.data.object).map_err(|e| {
        WebhookError::MalformedPayload(format!("{} object: {}", envelope.event_type, e))
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Wire objects
// ════════════════════════════════════════════════════════════════════════════════

/// A reference that Stripe sends either as a bare id or as an expanded object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    fn into_id(self) -> String {
        match self {
            Expandable::Id(id) | Expandable::Object { id } => id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    customer: Option<Expandable>,
    subscription: Option<Expandable>,
    customer_email: Option<String>,
    customer_details: Option<CustomerDetails>,
}

impl From<CheckoutSessionObject> for CheckoutCompleted {
    fn from(session: CheckoutSessionObject) -> Self {
        let detail_email = session.customer_details.and_then(|d| d.email);
        CheckoutCompleted {
            customer_email: non_empty(detail_email).or_else(|| non_empty(session.customer_email)),
            provider_customer_id: non_empty(session.customer.map(Expandable::into_id)),
            provider_subscription_id: non_empty(session.subscription.map(Expandable::into_id)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    customer: Option<Expandable>,
    status: Option<String>,
}

impl TryFrom<SubscriptionObject> for SubscriptionChange {
    type Error = WebhookError;

    fn try_from(subscription: SubscriptionObject) -> Result<Self, Self::Error> {
        let provider_subscription_id = non_empty(Some(subscription.id)).ok_or_else(|| {
            WebhookError::MalformedPayload("subscription object has empty id".to_string())
        })?;
        Ok(SubscriptionChange {
            provider_subscription_id,
            provider_customer_id: non_empty(subscription.customer.map(Expandable::into_id)),
            status: subscription.status,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Builder for Stripe event JSON payloads in tests.
#[cfg(test)]
pub(crate) struct StripeEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: serde_json::Value,
    livemode: bool,
}

#[cfg(test)]
impl Default for StripeEventBuilder {
    fn default() -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: "checkout.session.completed".to_string(),
            created: chrono::Utc::now().timestamp(),
            object: serde_json::json!({}),
            livemode: false,
        }
    }
}

#[cfg(test)]
impl StripeEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn created(mut self, created: i64) -> Self {
        self.created = created;
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn livemode(mut self, livemode: bool) -> Self {
        self.livemode = livemode;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "id": self.id,
            "object": "event",
            "type": self.event_type,
            "created": self.created,
            "livemode": self.livemode,
            "api_version": "2023-10-16",
            "data": { "object": self.object },
        }))
        .unwrap()
    }

    pub fn build(self) -> BillingEvent {
        BillingEvent::decode(VerifiedPayload::trusted(self.to_bytes())).unwrap()
    }
}
