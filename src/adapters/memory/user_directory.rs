//! In-memory user directory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::billing::UserIdentity;
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::UserDirectory;

/// In-memory user directory keyed by exact email.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<String, UserIdentity>>>,
    unavailable: Arc<AtomicBool>,
    lookups: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every lookup, to exercise caller deadlines.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Register a user.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `user_id` is empty.
    pub async fn add_user(&self, user_id: &str, email: &str) -> Result<(), DomainError> {
        let identity = UserIdentity {
            user_id: UserId::new(user_id)?,
            email: email.to_string(),
        };
        self.users.write().await.insert(email.to_string(), identity);
        Ok(())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of lookups performed so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, DomainError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DirectoryError,
                "user directory unavailable",
            ));
        }
        Ok(self.users.read().await.get(email).cloned())
    }
}
