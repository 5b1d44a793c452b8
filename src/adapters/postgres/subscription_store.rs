//! PostgreSQL implementation of SubscriptionStore.
//!
//! Both writes are single statements whose `WHERE` clause carries the
//! ordering guard, so concurrent deliveries for one key serialize on the
//! row lock. When a write touches no row, a follow-up read tells apart a
//! missing row, a newer stored event and an identical replay.

use crate::domain::billing::{
    StatusUpdate, SubscriptionRecord, SubscriptionStatus, SubscriptionUpsert, WriteOutcome,
};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::SubscriptionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL implementation of the SubscriptionStore port.
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    /// Creates a new PostgresSubscriptionStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    user_id: Uuid,
    provider_customer_id: Option<String>,
    provider_subscription_id: Option<String>,
    status: String,
    updated_at: DateTime<Utc>,
    last_event_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(SubscriptionRecord {
            user_id: UserId::new(row.user_id.to_string()).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
            })?,
            provider_customer_id: row.provider_customer_id,
            provider_subscription_id: row.provider_subscription_id,
            status: parse_status(&row.status)?,
            updated_at: Timestamp::from_datetime(row.updated_at),
            last_event_at: Timestamp::from_datetime(row.last_event_at),
        })
    }
}

fn parse_status(s: &str) -> Result<SubscriptionStatus, DomainError> {
    s.parse().map_err(|_| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid status value: {}", s),
        )
    })
}

fn parse_user_id_as_uuid(user_id: &UserId) -> Result<Uuid, DomainError> {
    Uuid::parse_str(user_id.as_str()).map_err(|e| {
        DomainError::new(
            ErrorCode::ValidationFailed,
            format!("User ID must be a valid UUID: {}", e),
        )
    })
}

fn database_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Failed to {}: {}", action, e))
}

/// Outcome of a guarded write that touched no row.
fn classify_untouched(stored_event_at: Option<DateTime<Utc>>, event_at: &Timestamp) -> WriteOutcome {
    match stored_event_at {
        None => WriteOutcome::NoMatch,
        Some(stored) if stored > *event_at.as_datetime() => WriteOutcome::Stale,
        Some(_) => WriteOutcome::Unchanged,
    }
}

const SELECT_COLUMNS: &str = "SELECT user_id, provider_customer_id, provider_subscription_id, \
     status, updated_at, last_event_at FROM subscriptions";

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn upsert_by_user(&self, upsert: &SubscriptionUpsert) -> Result<WriteOutcome, DomainError> {
        let user_uuid = parse_user_id_as_uuid(&upsert.user_id)?;

        let inserted: Option<bool> = sqlx::query_scalar(
            r#"
            INSERT INTO subscriptions (
                user_id, provider_customer_id, provider_subscription_id,
                status, last_event_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (user_id) DO UPDATE SET
                provider_customer_id = COALESCE(EXCLUDED.provider_customer_id, subscriptions.provider_customer_id),
                provider_subscription_id = COALESCE(EXCLUDED.provider_subscription_id, subscriptions.provider_subscription_id),
                status = EXCLUDED.status,
                last_event_at = EXCLUDED.last_event_at,
                updated_at = now()
            WHERE subscriptions.last_event_at <= EXCLUDED.last_event_at
              AND (
                subscriptions.provider_customer_id IS DISTINCT FROM
                    COALESCE(EXCLUDED.provider_customer_id, subscriptions.provider_customer_id)
                OR subscriptions.provider_subscription_id IS DISTINCT FROM
                    COALESCE(EXCLUDED.provider_subscription_id, subscriptions.provider_subscription_id)
                OR subscriptions.status IS DISTINCT FROM EXCLUDED.status
                OR subscriptions.last_event_at IS DISTINCT FROM EXCLUDED.last_event_at
              )
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(user_uuid)
        .bind(&upsert.provider_customer_id)
        .bind(&upsert.provider_subscription_id)
        .bind(upsert.status.as_str())
        .bind(upsert.event_at.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("upsert subscription", e))?;

        match inserted {
            Some(true) => Ok(WriteOutcome::Created),
            Some(false) => Ok(WriteOutcome::Updated),
            None => {
                let stored: Option<DateTime<Utc>> = sqlx::query_scalar(
                    "SELECT last_event_at FROM subscriptions WHERE user_id = $1",
                )
                .bind(user_uuid)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| database_error("read subscription", e))?;

                // The conflicting row exists; NoMatch is not a valid upsert outcome
                Ok(match classify_untouched(stored, &upsert.event_at) {
                    WriteOutcome::NoMatch => WriteOutcome::Unchanged,
                    other => other,
                })
            }
        }
    }

    async fn update_status_by_subscription(
        &self,
        update: &StatusUpdate,
    ) -> Result<WriteOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                status = $2,
                last_event_at = $3,
                updated_at = now()
            WHERE provider_subscription_id = $1
              AND last_event_at <= $3
              AND (status IS DISTINCT FROM $2 OR last_event_at IS DISTINCT FROM $3)
            "#,
        )
        .bind(&update.provider_subscription_id)
        .bind(update.status.as_str())
        .bind(update.event_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("update subscription status", e))?;

        if result.rows_affected() > 0 {
            return Ok(WriteOutcome::Updated);
        }

        let stored: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT max(last_event_at) FROM subscriptions
            WHERE provider_subscription_id = $1
            "#,
        )
        .bind(&update.provider_subscription_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error("read subscription", e))?;

        Ok(classify_untouched(stored, &update.event_at))
    }

    async fn find_by_user_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let user_uuid = parse_user_id_as_uuid(user_id)?;

        let row: Option<SubscriptionRow> =
            sqlx::query_as(&format!("{} WHERE user_id = $1", SELECT_COLUMNS))
                .bind(user_uuid)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| database_error("find subscription", e))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn find_by_subscription_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "{} WHERE provider_subscription_id = $1 ORDER BY last_event_at DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(provider_subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("find subscription", e))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_unix(secs).unwrap()
    }

    #[test]
    fn parse_status_works_for_all_values() {
        assert_eq!(parse_status("active").unwrap(), SubscriptionStatus::Active);
        assert_eq!(parse_status("inactive").unwrap(), SubscriptionStatus::Inactive);
        assert_eq!(parse_status("canceled").unwrap(), SubscriptionStatus::Canceled);
    }

    #[test]
    fn parse_status_rejects_invalid_values() {
        assert!(parse_status("past_due").is_err());
        assert!(parse_status("").is_err());
    }

    #[test]
    fn user_id_must_be_uuid() {
        let user_id = UserId::new("user_42").unwrap();
        let err = parse_user_id_as_uuid(&user_id).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);

        let user_id = UserId::new("7c9e6679-7425-40de-944b-e07fc1f90ae7").unwrap();
        assert!(parse_user_id_as_uuid(&user_id).is_ok());
    }

    #[test]
    fn untouched_write_classification() {
        let event_at = at(200);
        assert_eq!(classify_untouched(None, &event_at), WriteOutcome::NoMatch);
        assert_eq!(
            classify_untouched(Some(*at(300).as_datetime()), &event_at),
            WriteOutcome::Stale
        );
        assert_eq!(
            classify_untouched(Some(*at(200).as_datetime()), &event_at),
            WriteOutcome::Unchanged
        );
    }

    #[test]
    fn row_converts_to_record() {
        let row = SubscriptionRow {
            user_id: Uuid::parse_str("7c9e6679-7425-40de-944b-e07fc1f90ae7").unwrap(),
            provider_customer_id: Some("cus_1".to_string()),
            provider_subscription_id: None,
            status: "canceled".to_string(),
            updated_at: *at(100).as_datetime(),
            last_event_at: *at(90).as_datetime(),
        };

        let record = SubscriptionRecord::try_from(row).unwrap();

        assert_eq!(record.user_id.as_str(), "7c9e6679-7425-40de-944b-e07fc1f90ae7");
        assert_eq!(record.status, SubscriptionStatus::Canceled);
        assert_eq!(record.last_event_at, at(90));
    }
}
