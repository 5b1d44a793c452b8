//! Data transfer objects for the billing HTTP endpoints.

use serde::{Deserialize, Serialize};

use crate::application::HandleBillingWebhookResult;

/// Acknowledgment returned for every successfully processed delivery,
/// including benign no-ops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookAckResponse {
    pub received: bool,
    /// Short outcome label (e.g. `subscription_activated`, `ignored`).
    pub outcome: String,
    pub event_id: String,
}

impl From<&HandleBillingWebhookResult> for WebhookAckResponse {
    fn from(result: &HandleBillingWebhookResult) -> Self {
        Self {
            received: true,
            outcome: result.outcome.label().to_string(),
            event_id: result.event_id.clone(),
        }
    }
}

/// Standard error response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

/// Liveness probe body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}
