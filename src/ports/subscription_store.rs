//! Subscription store port.
//!
//! Defines the durable write path for subscription records. The reconciler
//! is the only caller; no other component mutates records.
//!
//! # Ordering
//!
//! Both writes are atomic and key-scoped. Implementations must apply the
//! same guard as [`SubscriptionRecord::apply_upsert`] and
//! [`SubscriptionRecord::apply_status`]: a write whose `event_at` is older
//! than the stored `last_event_at` is `Stale`, an identical write is
//! `Unchanged`, and neither touches the row.

use crate::domain::billing::{StatusUpdate, SubscriptionRecord, SubscriptionUpsert, WriteOutcome};
use crate::domain::foundation::{DomainError, UserId};
use async_trait::async_trait;

/// Repository port for subscription records.
///
/// Implementations must ensure:
/// - Unique `user_id` (at most one record per user)
/// - Lookup path on `provider_subscription_id`
/// - Absent identifiers in an upsert never clear stored identifiers
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert or update the record keyed by `user_id`.
    ///
    /// Returns `Created`, `Updated`, `Unchanged` or `Stale`.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn upsert_by_user(&self, upsert: &SubscriptionUpsert) -> Result<WriteOutcome, DomainError>;

    /// Update the status of the record keyed by provider subscription id.
    ///
    /// Returns `NoMatch` when no record carries the id; never creates one.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn update_status_by_subscription(
        &self,
        update: &StatusUpdate,
    ) -> Result<WriteOutcome, DomainError>;

    /// Find the record for a user.
    async fn find_by_user_id(&self, user_id: &UserId)
        -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Find the record carrying a provider subscription id.
    async fn find_by_subscription_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;
}
