//! User directory port.
//!
//! Read-only view of the application's user accounts. The service never
//! creates users; it only maps a payment email to an existing account.

use crate::domain::billing::UserIdentity;
use crate::domain::foundation::DomainError;
use async_trait::async_trait;

/// Lookup port for user identities.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find the user whose email equals `email` exactly.
    ///
    /// A single indexed lookup. Matching is case-sensitive and performs no
    /// normalization. Returns `None` when no account matches.
    ///
    /// # Errors
    ///
    /// - `DirectoryError` or `DatabaseError` when the directory is unreachable
    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, DomainError>;
}
