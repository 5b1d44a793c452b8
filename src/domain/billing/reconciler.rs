//! Subscription reconciler - the only write path to subscription records.

use std::sync::Arc;
use std::time::Duration;

use super::identity::UserIdentity;
use super::stripe_event::CheckoutCompleted;
use super::subscription::{StatusUpdate, SubscriptionStatus, SubscriptionUpsert, WriteOutcome};
use super::webhook_errors::WebhookError;
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::SubscriptionStore;

/// Applies resolved events to the subscription store.
///
/// Every store call is bounded by `timeout`; failures and timeouts surface
/// as retryable errors so the provider redelivers.
#[derive(Clone)]
pub struct SubscriptionReconciler {
    store: Arc<dyn SubscriptionStore>,
    timeout: Duration,
}

impl SubscriptionReconciler {
    pub fn new(store: Arc<dyn SubscriptionStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Upsert the user's record from a completed checkout, status active.
    pub async fn apply_checkout(
        &self,
        user: &UserIdentity,
        checkout: &CheckoutCompleted,
        event_at: Timestamp,
    ) -> Result<WriteOutcome, WebhookError> {
        let upsert = SubscriptionUpsert {
            user_id: user.user_id.clone(),
            provider_customer_id: checkout.provider_customer_id.clone(),
            provider_subscription_id: checkout.provider_subscription_id.clone(),
            status: SubscriptionStatus::Active,
            event_at,
        };
        self.bounded(
            ("user_id", upsert.user_id.as_str()),
            self.store.upsert_by_user(&upsert),
        )
        .await
    }

    /// Set the status of the record carrying `provider_subscription_id`.
    pub async fn apply_status(
        &self,
        provider_subscription_id: &str,
        status: SubscriptionStatus,
        event_at: Timestamp,
    ) -> Result<WriteOutcome, WebhookError> {
        let update = StatusUpdate {
            provider_subscription_id: provider_subscription_id.to_string(),
            status,
            event_at,
        };
        self.bounded(
            ("subscription_id", provider_subscription_id),
            self.store.update_status_by_subscription(&update),
        )
        .await
    }

    /// Runs one store write under the timeout, tagging failures with the write key.
    async fn bounded<F>(&self, key: (&str, &str), write: F) -> Result<WriteOutcome, WebhookError>
    where
        F: std::future::Future<Output = Result<WriteOutcome, DomainError>>,
    {
        let outcome = tokio::time::timeout(self.timeout, write)
            .await
            .map_err(|_| WebhookError::Timeout("subscription store"))?
            .map_err(|e| e.with_detail(key.0, key.1))?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionStore;
    use crate::domain::foundation::UserId;

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_unix(secs).unwrap()
    }

    fn user() -> UserIdentity {
        UserIdentity {
            user_id: UserId::new("user_42").unwrap(),
            email: "a@x.com".to_string(),
        }
    }

    fn checkout() -> CheckoutCompleted {
        CheckoutCompleted {
            customer_email: Some("a@x.com".to_string()),
            provider_customer_id: Some("cus_1".to_string()),
            provider_subscription_id: Some("sub_1".to_string()),
        }
    }

    fn reconciler(store: &InMemorySubscriptionStore) -> SubscriptionReconciler {
        SubscriptionReconciler::new(Arc::new(store.clone()), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn checkout_creates_active_record() {
        let store = InMemorySubscriptionStore::new();

        let outcome = reconciler(&store)
            .apply_checkout(&user(), &checkout(), at(100))
            .await
            .unwrap();

        let record = store
            .find_by_user_id(&UserId::new("user_42").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Created);
        assert_eq!(record.status, SubscriptionStatus::Active);
        assert_eq!(record.provider_subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(record.provider_customer_id.as_deref(), Some("cus_1"));
    }

    #[tokio::test]
    async fn status_without_record_is_no_match() {
        let store = InMemorySubscriptionStore::new();

        let outcome = reconciler(&store)
            .apply_status("sub_1", SubscriptionStatus::Inactive, at(100))
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::NoMatch);
        assert!(store.records().await.is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_retryable() {
        let store = InMemorySubscriptionStore::new();
        store.set_unavailable(true);

        let err = reconciler(&store)
            .apply_checkout(&user(), &checkout(), at(100))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::Store(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn store_failure_names_the_write_key() {
        let store = InMemorySubscriptionStore::new();
        store.set_unavailable(true);

        let err = reconciler(&store)
            .apply_status("sub_9", SubscriptionStatus::Canceled, at(100))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::Store(ref m) if m.contains("subscription_id=sub_9")));
    }
}
