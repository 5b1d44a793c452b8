//! Subscription record and the write semantics shared by every store.
//!
//! Writes are ordered by the provider event time: a record remembers the
//! creation time of the last event applied to it (`last_event_at`) and
//! refuses anything older. Re-applying an identical event leaves the
//! record untouched, so redelivery converges without an event log.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{Timestamp, UserId, ValidationError};

/// Entitlement status kept for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Canceled,
}

impl SubscriptionStatus {
    /// Collapses the provider status vocabulary.
    ///
    /// Exactly `"active"` maps to `Active`; every other value, including
    /// `trialing` and `past_due`, maps to `Inactive`.
    pub fn from_provider_status(status: &str) -> Self {
        if status == "active" {
            SubscriptionStatus::Active
        } else {
            SubscriptionStatus::Inactive
        }
    }

    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "inactive" => Ok(SubscriptionStatus::Inactive),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}

/// Durable subscription record, one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub user_id: UserId,
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub status: SubscriptionStatus,
    pub updated_at: Timestamp,
    /// Creation time of the newest provider event applied so far.
    pub last_event_at: Timestamp,
}

/// Upsert keyed on `user_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpsert {
    pub user_id: UserId,
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub status: SubscriptionStatus,
    pub event_at: Timestamp,
}

/// Status change keyed on `provider_subscription_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub provider_subscription_id: String,
    pub status: SubscriptionStatus,
    pub event_at: Timestamp,
}

/// Result of a guarded store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// A new record was inserted.
    Created,
    /// An existing record was modified.
    Updated,
    /// The write would not change anything; record left as is.
    Unchanged,
    /// No record matches the key. Only produced by status updates.
    NoMatch,
    /// A newer event was already applied; record left as is.
    Stale,
}

impl WriteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOutcome::Created => "created",
            WriteOutcome::Updated => "updated",
            WriteOutcome::Unchanged => "unchanged",
            WriteOutcome::NoMatch => "no_match",
            WriteOutcome::Stale => "stale",
        }
    }

    /// True if the store row was inserted or modified.
    pub fn changed_record(&self) -> bool {
        matches!(self, WriteOutcome::Created | WriteOutcome::Updated)
    }
}

impl SubscriptionRecord {
    /// Builds the record an upsert creates when none exists for the user.
    pub fn from_upsert(upsert: SubscriptionUpsert, now: Timestamp) -> Self {
        Self {
            user_id: upsert.user_id,
            provider_customer_id: upsert.provider_customer_id,
            provider_subscription_id: upsert.provider_subscription_id,
            status: upsert.status,
            updated_at: now,
            last_event_at: upsert.event_at,
        }
    }

    /// Applies an upsert to an existing record.
    ///
    /// Absent identifiers keep the stored values.
    pub fn apply_upsert(&mut self, upsert: &SubscriptionUpsert, now: Timestamp) -> WriteOutcome {
        if self.last_event_at > upsert.event_at {
            return WriteOutcome::Stale;
        }

        let customer_id = upsert
            .provider_customer_id
            .clone()
            .or_else(|| self.provider_customer_id.clone());
        let subscription_id = upsert
            .provider_subscription_id
            .clone()
            .or_else(|| self.provider_subscription_id.clone());

        if customer_id == self.provider_customer_id
            && subscription_id == self.provider_subscription_id
            && upsert.status == self.status
            && upsert.event_at == self.last_event_at
        {
            return WriteOutcome::Unchanged;
        }

        self.provider_customer_id = customer_id;
        self.provider_subscription_id = subscription_id;
        self.status = upsert.status;
        self.last_event_at = upsert.event_at;
        self.updated_at = now;
        WriteOutcome::Updated
    }

    /// Applies a status update to a record already matched by subscription id.
    pub fn apply_status(&mut self, update: &StatusUpdate, now: Timestamp) -> WriteOutcome {
        if self.last_event_at > update.event_at {
            return WriteOutcome::Stale;
        }

        if update.status == self.status && update.event_at == self.last_event_at {
            return WriteOutcome::Unchanged;
        }

        self.status = update.status;
        self.last_event_at = update.event_at;
        self.updated_at = now;
        WriteOutcome::Updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_unix(secs).unwrap()
    }

    fn user() -> UserId {
        UserId::new("user_42").unwrap()
    }

    fn upsert(event_at: i64) -> SubscriptionUpsert {
        SubscriptionUpsert {
            user_id: user(),
            provider_customer_id: Some("cus_1".to_string()),
            provider_subscription_id: Some("sub_1".to_string()),
            status: SubscriptionStatus::Active,
            event_at: at(event_at),
        }
    }

    fn record(event_at: i64) -> SubscriptionRecord {
        SubscriptionRecord::from_upsert(upsert(event_at), at(event_at))
    }

    // ══════════════════════════════════════════════════════════════
    // Status Collapse Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn active_maps_to_active() {
        assert_eq!(
            SubscriptionStatus::from_provider_status("active"),
            SubscriptionStatus::Active
        );
    }

    #[test]
    fn transitional_states_map_to_inactive() {
        for status in ["trialing", "past_due", "unpaid", "incomplete", "paused", "Active", ""] {
            assert_eq!(
                SubscriptionStatus::from_provider_status(status),
                SubscriptionStatus::Inactive,
                "status {:?}",
                status
            );
        }
    }

    #[test]
    fn status_parses_stored_values() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::Inactive,
            SubscriptionStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<SubscriptionStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<SubscriptionStatus>().is_err());
    }

    proptest! {
        #[test]
        fn anything_but_exact_active_is_inactive(status in "\\PC*") {
            prop_assume!(status != "active");
            prop_assert_eq!(
                SubscriptionStatus::from_provider_status(&status),
                SubscriptionStatus::Inactive
            );
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Upsert Semantics Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn identical_upsert_is_unchanged() {
        let mut rec = record(100);
        let before = rec.clone();

        let outcome = rec.apply_upsert(&upsert(100), at(500));

        assert_eq!(outcome, WriteOutcome::Unchanged);
        assert_eq!(rec, before);
    }

    #[test]
    fn older_upsert_is_stale() {
        let mut rec = record(100);
        let mut older = upsert(50);
        older.provider_subscription_id = Some("sub_old".to_string());

        assert_eq!(rec.apply_upsert(&older, at(500)), WriteOutcome::Stale);
        assert_eq!(rec.provider_subscription_id.as_deref(), Some("sub_1"));
    }

    #[test]
    fn newer_upsert_overwrites_fields() {
        let mut rec = record(100);
        rec.status = SubscriptionStatus::Canceled;
        let mut newer = upsert(200);
        newer.provider_subscription_id = Some("sub_2".to_string());

        assert_eq!(rec.apply_upsert(&newer, at(300)), WriteOutcome::Updated);
        assert_eq!(rec.status, SubscriptionStatus::Active);
        assert_eq!(rec.provider_subscription_id.as_deref(), Some("sub_2"));
        assert_eq!(rec.updated_at, at(300));
        assert_eq!(rec.last_event_at, at(200));
    }

    #[test]
    fn absent_ids_never_overwrite_stored_ids() {
        let mut rec = record(100);
        let mut sparse = upsert(200);
        sparse.provider_customer_id = None;
        sparse.provider_subscription_id = None;

        rec.apply_upsert(&sparse, at(300));

        assert_eq!(rec.provider_customer_id.as_deref(), Some("cus_1"));
        assert_eq!(rec.provider_subscription_id.as_deref(), Some("sub_1"));
    }

    // ══════════════════════════════════════════════════════════════
    // Status Update Semantics Tests
    // ══════════════════════════════════════════════════════════════

    fn status_update(status: SubscriptionStatus, event_at: i64) -> StatusUpdate {
        StatusUpdate {
            provider_subscription_id: "sub_1".to_string(),
            status,
            event_at: at(event_at),
        }
    }

    #[test]
    fn status_update_changes_status_only() {
        let mut rec = record(100);

        let outcome = rec.apply_status(&status_update(SubscriptionStatus::Inactive, 150), at(160));

        assert_eq!(outcome, WriteOutcome::Updated);
        assert_eq!(rec.status, SubscriptionStatus::Inactive);
        assert_eq!(rec.provider_customer_id.as_deref(), Some("cus_1"));
        assert_eq!(rec.updated_at, at(160));
    }

    #[test]
    fn replayed_status_update_is_unchanged() {
        let mut rec = record(100);
        let update = status_update(SubscriptionStatus::Canceled, 150);
        rec.apply_status(&update, at(160));
        let before = rec.clone();

        assert_eq!(rec.apply_status(&update, at(999)), WriteOutcome::Unchanged);
        assert_eq!(rec, before);
    }

    #[test]
    fn delayed_status_update_does_not_regress_record() {
        let mut rec = record(100);
        rec.apply_status(&status_update(SubscriptionStatus::Canceled, 300), at(310));

        let outcome = rec.apply_status(&status_update(SubscriptionStatus::Inactive, 200), at(320));

        assert_eq!(outcome, WriteOutcome::Stale);
        assert_eq!(rec.status, SubscriptionStatus::Canceled);
    }

    #[test]
    fn write_outcome_labels() {
        assert_eq!(WriteOutcome::NoMatch.as_str(), "no_match");
        assert!(WriteOutcome::Created.changed_record());
        assert!(!WriteOutcome::Stale.changed_record());
    }
}
