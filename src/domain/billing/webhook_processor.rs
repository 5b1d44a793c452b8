//! Webhook processor - Routes verified billing events to their handlers.
//!
//! ## Design
//!
//! Each handler declares the event kinds it processes. The
//! [`HandlerRegistry`] builds a kind → handler table from those
//! declarations and invokes exactly one handler per event. Kinds nobody
//! registered for are acknowledged as [`WebhookOutcome::Ignored`] without
//! touching the directory or the store.
//!
//! There is no processed-event ledger: redelivery is made harmless by the
//! guarded writes in the store, not by remembering event ids.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use super::identity::IdentityResolver;
use super::reconciler::SubscriptionReconciler;
use super::stripe_event::{BillingEvent, BillingEventKind, BillingEventType, SubscriptionChange};
use super::subscription::{SubscriptionStatus, WriteOutcome};
use super::webhook_errors::WebhookError;
use crate::domain::foundation::UserId;

/// What processing an event amounted to. Every variant is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Checkout reconciled into the user's record.
    SubscriptionActivated { user_id: UserId, write: WriteOutcome },
    /// Status update or deletion applied to a matched record.
    StatusChanged {
        provider_subscription_id: String,
        status: SubscriptionStatus,
        write: WriteOutcome,
    },
    /// Checkout email missing or unknown to the directory.
    IdentityNotFound,
    /// No record carries the subscription id; nothing was created.
    SubscriptionNotFound { provider_subscription_id: String },
    /// Event kind with no registered handler.
    Ignored { event_type: String },
}

impl WebhookOutcome {
    /// Short label used in logs and the acknowledgment body.
    ///
    /// A write refused because a newer event was already applied is
    /// `stale_ignored`, whichever handler produced it.
    pub fn label(&self) -> &'static str {
        match self {
            WebhookOutcome::SubscriptionActivated {
                write: WriteOutcome::Stale,
                ..
            }
            | WebhookOutcome::StatusChanged {
                write: WriteOutcome::Stale,
                ..
            } => "stale_ignored",
            WebhookOutcome::SubscriptionActivated { .. } => "subscription_activated",
            WebhookOutcome::StatusChanged { .. } => "status_changed",
            WebhookOutcome::IdentityNotFound => "identity_not_found",
            WebhookOutcome::SubscriptionNotFound { .. } => "subscription_not_found",
            WebhookOutcome::Ignored { .. } => "ignored",
        }
    }
}

/// Handler for a specific type of billing event.
///
/// Implementations should be stateless apart from their collaborators and
/// focus on the kinds they declare.
#[async_trait]
pub trait WebhookEventHandler: Send + Sync {
    /// Returns the event type(s) this handler processes.
    fn handles(&self) -> Vec<BillingEventType>;

    /// Handles the event.
    ///
    /// Benign no-ops are `Ok` outcomes; `Err` is reserved for failures the
    /// sender should hear about.
    async fn handle(&self, event: &BillingEvent) -> Result<WebhookOutcome, WebhookError>;
}

/// Two handlers declared the same event kind.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("a handler is already registered for {0}")]
pub struct DuplicateHandler(pub &'static str);

/// Kind → handler dispatch table.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<BillingEventType, Arc<dyn WebhookEventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the checkout, update and delete handlers.
    ///
    /// # Errors
    ///
    /// `DuplicateHandler` if two of the handlers declare the same kind.
    pub fn standard(
        resolver: IdentityResolver,
        reconciler: SubscriptionReconciler,
    ) -> Result<Self, DuplicateHandler> {
        let mut registry = Self::new();
        registry.register(Arc::new(CheckoutCompletedHandler::new(
            resolver,
            reconciler.clone(),
        )))?;
        registry.register(Arc::new(SubscriptionUpdatedHandler::new(reconciler.clone())))?;
        registry.register(Arc::new(SubscriptionDeletedHandler::new(reconciler)))?;
        Ok(registry)
    }

    /// Register a handler for every kind it declares.
    ///
    /// # Errors
    ///
    /// Rejects the handler, registering nothing, if any declared kind is
    /// already taken.
    pub fn register(&mut self, handler: Arc<dyn WebhookEventHandler>) -> Result<(), DuplicateHandler> {
        let kinds = handler.handles();
        if let Some(taken) = kinds.iter().find(|k| self.handlers.contains_key(k)) {
            return Err(DuplicateHandler(taken.as_str()));
        }
        for kind in kinds {
            self.handlers.insert(kind, handler.clone());
        }
        Ok(())
    }

    /// Find the handler for an event kind.
    pub fn get_handler(&self, event_type: &BillingEventType) -> Option<&dyn WebhookEventHandler> {
        self.handlers.get(event_type).map(|h| h.as_ref())
    }

    /// Dispatch an event to its handler.
    pub async fn dispatch(&self, event: &BillingEvent) -> Result<WebhookOutcome, WebhookError> {
        match self.get_handler(&event.parsed_type()) {
            Some(handler) => handler.handle(event).await,
            None => {
                tracing::info!(
                    event_id = %event.provider_event_id,
                    event_type = %event.event_type,
                    "No handler for event type, acknowledging"
                );
                Ok(WebhookOutcome::Ignored {
                    event_type: event.event_type.clone(),
                })
            }
        }
    }
}

fn unexpected_kind(event: &BillingEvent) -> WebhookError {
    WebhookError::MalformedPayload(format!(
        "handler received unexpected event type {}",
        event.event_type
    ))
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// `checkout.session.completed`: resolve the buyer, activate their record.
pub struct CheckoutCompletedHandler {
    resolver: IdentityResolver,
    reconciler: SubscriptionReconciler,
}

impl CheckoutCompletedHandler {
    pub fn new(resolver: IdentityResolver, reconciler: SubscriptionReconciler) -> Self {
        Self {
            resolver,
            reconciler,
        }
    }
}

#[async_trait]
impl WebhookEventHandler for CheckoutCompletedHandler {
    fn handles(&self) -> Vec<BillingEventType> {
        vec![BillingEventType::CheckoutSessionCompleted]
    }

    async fn handle(&self, event: &BillingEvent) -> Result<WebhookOutcome, WebhookError> {
        let BillingEventKind::SessionCompleted(checkout) = &event.kind else {
            return Err(unexpected_kind(event));
        };

        let Some(email) = checkout.customer_email.as_deref() else {
            tracing::warn!(
                event_id = %event.provider_event_id,
                "Checkout session has no customer email, acknowledging"
            );
            return Ok(WebhookOutcome::IdentityNotFound);
        };

        let Some(user) = self.resolver.resolve(email).await? else {
            tracing::warn!(
                event_id = %event.provider_event_id,
                "No user matches checkout email, acknowledging"
            );
            return Ok(WebhookOutcome::IdentityNotFound);
        };

        let write = self
            .reconciler
            .apply_checkout(&user, checkout, event.created)
            .await?;

        tracing::info!(
            event_id = %event.provider_event_id,
            user_id = %user.user_id,
            subscription_id = ?checkout.provider_subscription_id,
            write = write.as_str(),
            changed = write.changed_record(),
            "Checkout reconciled"
        );

        Ok(WebhookOutcome::SubscriptionActivated {
            user_id: user.user_id,
            write,
        })
    }
}

/// `customer.subscription.updated`: collapse the provider status.
pub struct SubscriptionUpdatedHandler {
    reconciler: SubscriptionReconciler,
}

impl SubscriptionUpdatedHandler {
    pub fn new(reconciler: SubscriptionReconciler) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl WebhookEventHandler for SubscriptionUpdatedHandler {
    fn handles(&self) -> Vec<BillingEventType> {
        vec![BillingEventType::CustomerSubscriptionUpdated]
    }

    async fn handle(&self, event: &BillingEvent) -> Result<WebhookOutcome, WebhookError> {
        let BillingEventKind::SubscriptionUpdated(change) = &event.kind else {
            return Err(unexpected_kind(event));
        };

        let status = change
            .status
            .as_deref()
            .map(SubscriptionStatus::from_provider_status)
            .unwrap_or(SubscriptionStatus::Inactive);

        apply_status_change(&self.reconciler, event, change, status).await
    }
}

/// `customer.subscription.deleted`: always canceled.
pub struct SubscriptionDeletedHandler {
    reconciler: SubscriptionReconciler,
}

impl SubscriptionDeletedHandler {
    pub fn new(reconciler: SubscriptionReconciler) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl WebhookEventHandler for SubscriptionDeletedHandler {
    fn handles(&self) -> Vec<BillingEventType> {
        vec![BillingEventType::CustomerSubscriptionDeleted]
    }

    async fn handle(&self, event: &BillingEvent) -> Result<WebhookOutcome, WebhookError> {
        let BillingEventKind::SubscriptionDeleted(change) = &event.kind else {
            return Err(unexpected_kind(event));
        };

        apply_status_change(&self.reconciler, event, change, SubscriptionStatus::Canceled).await
    }
}

async fn apply_status_change(
    reconciler: &SubscriptionReconciler,
    event: &BillingEvent,
    change: &SubscriptionChange,
    status: SubscriptionStatus,
) -> Result<WebhookOutcome, WebhookError> {
    let write = reconciler
        .apply_status(&change.provider_subscription_id, status, event.created)
        .await?;

    if write == WriteOutcome::NoMatch {
        tracing::info!(
            event_id = %event.provider_event_id,
            subscription_id = %change.provider_subscription_id,
            "No record for subscription, acknowledging"
        );
        return Ok(WebhookOutcome::SubscriptionNotFound {
            provider_subscription_id: change.provider_subscription_id.clone(),
        });
    }

    if write == WriteOutcome::Stale {
        tracing::info!(
            event_id = %event.provider_event_id,
            subscription_id = %change.provider_subscription_id,
            "Newer event already applied, skipping"
        );
    } else {
        tracing::info!(
            event_id = %event.provider_event_id,
            subscription_id = %change.provider_subscription_id,
            status = status.as_str(),
            write = write.as_str(),
            changed = write.changed_record(),
            "Subscription status reconciled"
        );
    }

    Ok(WebhookOutcome::StatusChanged {
        provider_subscription_id: change.provider_subscription_id.clone(),
        status,
        write,
    })
}
