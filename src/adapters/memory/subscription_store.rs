//! In-memory subscription store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{StatusUpdate, SubscriptionRecord, SubscriptionUpsert, WriteOutcome};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::SubscriptionStore;

/// In-memory storage for subscription records, keyed by user id.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionStore {
    records: Arc<RwLock<HashMap<String, SubscriptionRecord>>>,
    unavailable: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of port calls made so far, including failed ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Seed a record directly, bypassing the write guard.
    pub async fn insert(&self, record: SubscriptionRecord) {
        self.records
            .write()
            .await
            .insert(record.user_id.as_str().to_string(), record);
    }

    /// All stored records.
    pub async fn records(&self) -> Vec<SubscriptionRecord> {
        self.records.read().await.values().cloned().collect()
    }

    fn enter(&self) -> Result<(), DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::Unavailable,
                "subscription store unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn upsert_by_user(&self, upsert: &SubscriptionUpsert) -> Result<WriteOutcome, DomainError> {
        self.enter()?;
        let mut records = self.records.write().await;
        let now = Timestamp::now();

        match records.get_mut(upsert.user_id.as_str()) {
            Some(existing) => Ok(existing.apply_upsert(upsert, now)),
            None => {
                records.insert(
                    upsert.user_id.as_str().to_string(),
                    SubscriptionRecord::from_upsert(upsert.clone(), now),
                );
                Ok(WriteOutcome::Created)
            }
        }
    }

    async fn update_status_by_subscription(
        &self,
        update: &StatusUpdate,
    ) -> Result<WriteOutcome, DomainError> {
        self.enter()?;
        let mut records = self.records.write().await;
        let now = Timestamp::now();

        let outcomes: Vec<WriteOutcome> = records
            .values_mut()
            .filter(|r| r.provider_subscription_id.as_deref() == Some(&update.provider_subscription_id))
            .map(|r| r.apply_status(update, now))
            .collect();

        let outcome = if outcomes.is_empty() {
            WriteOutcome::NoMatch
        } else if outcomes.contains(&WriteOutcome::Updated) {
            WriteOutcome::Updated
        } else if outcomes.contains(&WriteOutcome::Stale) {
            WriteOutcome::Stale
        } else {
            WriteOutcome::Unchanged
        };
        Ok(outcome)
    }

    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.enter()?;
        Ok(self.records.read().await.get(user_id.as_str()).cloned())
    }

    async fn find_by_subscription_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.enter()?;
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.provider_subscription_id.as_deref() == Some(provider_subscription_id))
            .cloned())
    }
}
