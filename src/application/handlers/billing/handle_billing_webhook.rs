//! HandleBillingWebhookHandler - Command handler for inbound payment provider webhooks.
//!
//! Runs one delivery through the pipeline:
//!
//! 1. Required settings present, else `Configuration` (before any signature work)
//! 2. Signature header present, else `MissingSignature`
//! 3. Verify the raw bytes, then decode the verified payload
//! 4. Warn when the event mode disagrees with the configured key mode
//! 5. Dispatch to the handler registered for the event kind

use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::Instrument;

use crate::config::{AppConfig, ValidationError};
use crate::domain::billing::{
    BillingEvent, DuplicateHandler, ErrorCategory, HandlerRegistry, IdentityResolver,
    StripeWebhookVerifier, SubscriptionReconciler, WebhookError, WebhookOutcome,
};
use crate::ports::{SubscriptionStore, UserDirectory};

/// Command to handle a billing webhook.
#[derive(Debug, Clone)]
pub struct HandleBillingWebhookCommand {
    /// Raw webhook body, exactly as received.
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header value, if the request carried one.
    pub signature: Option<String>,
}

/// Result of webhook processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleBillingWebhookResult {
    pub event_id: String,
    pub event_type: String,
    pub outcome: WebhookOutcome,
}

/// Handler for processing billing webhooks.
///
/// Holds no per-request state; concurrent deliveries share only the
/// collaborators behind the registry.
pub struct HandleBillingWebhookHandler {
    config: Arc<AppConfig>,
    registry: HandlerRegistry,
}

impl HandleBillingWebhookHandler {
    /// Wires the standard handlers over the given directory and store.
    pub fn new(
        config: Arc<AppConfig>,
        directory: Arc<dyn UserDirectory>,
        store: Arc<dyn SubscriptionStore>,
    ) -> Result<Self, DuplicateHandler> {
        let timeout = config.server.dependency_timeout();
        let registry = HandlerRegistry::standard(
            IdentityResolver::new(directory, timeout),
            SubscriptionReconciler::new(store, timeout),
        )?;
        Ok(Self::with_registry(config, registry))
    }

    /// Uses a caller-built registry.
    pub fn with_registry(config: Arc<AppConfig>, registry: HandlerRegistry) -> Self {
        Self { config, registry }
    }

    pub async fn handle(
        &self,
        cmd: HandleBillingWebhookCommand,
    ) -> Result<HandleBillingWebhookResult, WebhookError> {
        let result = self.process(cmd).await;
        if let Err(err) = &result {
            log_failure(err);
        }
        result
    }

    async fn process(
        &self,
        cmd: HandleBillingWebhookCommand,
    ) -> Result<HandleBillingWebhookResult, WebhookError> {
        // 1. Configuration before anything that depends on it
        let settings = self.config.required_settings().map_err(|e| match e {
            ValidationError::MissingRequired(name) => WebhookError::Configuration(name),
            _ => WebhookError::Configuration("required settings"),
        })?;

        // 2. Signature header
        let signature = cmd
            .signature
            .filter(|s| !s.trim().is_empty())
            .ok_or(WebhookError::MissingSignature)?;

        // 3. Verify raw bytes, then decode
        let verifier =
            StripeWebhookVerifier::new(settings.stripe_webhook_secret.expose_secret().as_str())
                .with_tolerance(self.config.payment.signature_tolerance_secs);
        let verified = verifier.verify(cmd.payload, &signature)?;
        let event = BillingEvent::decode(verified)?;

        let span = tracing::info_span!(
            "billing_webhook",
            event_id = %event.provider_event_id,
            event_type = %event.event_type,
        );

        async {
            // 4. Mode mismatch is worth an operator's attention, not a rejection
            self.check_livemode(&event);

            // 5. Dispatch
            let outcome = self.registry.dispatch(&event).await?;
            tracing::info!(outcome = outcome.label(), "Webhook processed");

            Ok(HandleBillingWebhookResult {
                event_id: event.provider_event_id.clone(),
                event_type: event.event_type.clone(),
                outcome,
            })
        }
        .instrument(span)
        .await
    }

    fn check_livemode(&self, event: &BillingEvent) {
        let payment = &self.config.payment;
        let mismatch = (event.livemode && payment.is_test_mode())
            || (!event.livemode && payment.is_live_mode());
        if mismatch {
            tracing::warn!(
                event_livemode = event.livemode,
                "Event mode does not match the configured Stripe key mode"
            );
        }
    }
}

fn log_failure(err: &WebhookError) {
    match err.category() {
        ErrorCategory::Authentication | ErrorCategory::Malformed => {
            tracing::warn!(error = %err, "Rejected webhook delivery");
        }
        ErrorCategory::Configuration => {
            tracing::error!(error = %err, "Webhook endpoint is misconfigured");
        }
        ErrorCategory::Infrastructure => {
            tracing::error!(error = %err, retryable = true, "Webhook processing failed");
        }
    }
}
