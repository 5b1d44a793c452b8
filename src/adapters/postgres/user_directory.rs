//! PostgreSQL implementation of UserDirectory over the `auth.users` table.

use crate::domain::billing::UserIdentity;
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::UserDirectory;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Reads user accounts from the auth schema. Never writes.
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: Option<String>,
}

impl TryFrom<UserRow> for UserIdentity {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserIdentity {
            user_id: UserId::new(row.id.to_string())?,
            email: row.email.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, DomainError> {
        // Exact match; no lower() on either side.
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, email FROM auth.users WHERE email = $1 LIMIT 1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::new(
                        ErrorCode::DirectoryError,
                        format!("Failed to look up user: {}", e),
                    )
                })?;

        row.map(UserIdentity::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_to_identity() {
        let row = UserRow {
            id: Uuid::parse_str("7c9e6679-7425-40de-944b-e07fc1f90ae7").unwrap(),
            email: Some("a@x.com".to_string()),
        };

        let identity = UserIdentity::try_from(row).unwrap();

        assert_eq!(identity.user_id.as_str(), "7c9e6679-7425-40de-944b-e07fc1f90ae7");
        assert_eq!(identity.email, "a@x.com");
    }
}
