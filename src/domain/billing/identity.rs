//! Identity resolution - maps a payment email to an application user.

use std::sync::Arc;
use std::time::Duration;

use super::webhook_errors::WebhookError;
use crate::domain::foundation::UserId;
use crate::ports::UserDirectory;

/// A user account as seen by this service. Read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: UserId,
    pub email: String,
}

/// Resolves payment emails through the user directory.
///
/// One directory call per resolution, bounded by `timeout`. A miss is
/// `Ok(None)`; an unreachable or slow directory is a retryable error.
#[derive(Clone)]
pub struct IdentityResolver {
    directory: Arc<dyn UserDirectory>,
    timeout: Duration,
}

impl IdentityResolver {
    pub fn new(directory: Arc<dyn UserDirectory>, timeout: Duration) -> Self {
        Self { directory, timeout }
    }

    /// Look up the user whose email matches exactly.
    pub async fn resolve(&self, email: &str) -> Result<Option<UserIdentity>, WebhookError> {
        tokio::time::timeout(self.timeout, self.directory.find_by_email(email))
            .await
            .map_err(|_| WebhookError::Timeout("user directory"))?
            .map_err(|e| WebhookError::Directory(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryUserDirectory;

    async fn directory_with_user() -> InMemoryUserDirectory {
        let directory = InMemoryUserDirectory::new();
        directory.add_user("user_42", "a@x.com").await.unwrap();
        directory
    }

    #[tokio::test]
    async fn resolves_exact_email() {
        let resolver = IdentityResolver::new(
            Arc::new(directory_with_user().await),
            Duration::from_secs(1),
        );

        let identity = resolver.resolve("a@x.com").await.unwrap().unwrap();

        assert_eq!(identity.user_id.as_str(), "user_42");
    }

    #[tokio::test]
    async fn different_case_is_a_miss() {
        let resolver = IdentityResolver::new(
            Arc::new(directory_with_user().await),
            Duration::from_secs(1),
        );

        assert!(resolver.resolve("A@X.COM").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn directory_failure_is_retryable() {
        let directory = directory_with_user().await;
        directory.set_unavailable(true);
        let resolver = IdentityResolver::new(Arc::new(directory), Duration::from_secs(1));

        let err = resolver.resolve("a@x.com").await.unwrap_err();

        assert!(matches!(err, WebhookError::Directory(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_directory_times_out() {
        let directory = directory_with_user()
            .await
            .with_latency(Duration::from_secs(30));
        let resolver = IdentityResolver::new(Arc::new(directory), Duration::from_millis(50));

        let err = resolver.resolve("a@x.com").await.unwrap_err();

        assert!(matches!(err, WebhookError::Timeout("user directory")));
        assert!(err.is_retryable());
    }
}
