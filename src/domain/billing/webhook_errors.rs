//! Webhook error types for Stripe webhook handling.
//!
//! Defines all error conditions that can occur during webhook processing,
//! with HTTP status code mapping and retryability semantics.
//!
//! Benign no-ops (unknown event kinds, unresolved identities, updates for
//! subscriptions we have never seen) are not errors; they are reported as
//! [`WebhookOutcome`](super::WebhookOutcome) variants instead.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::DomainError;

/// Coarse classification used for logging and the public error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad or missing signature, stale timestamp. Terminal.
    Authentication,
    /// Verified body that cannot be decoded. Terminal.
    Malformed,
    /// Required operational settings missing. Operator-visible.
    Configuration,
    /// Directory or store unreachable. Retryable.
    Infrastructure,
}

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Request carried no signature header.
    #[error("Missing signature header")]
    MissingSignature,

    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is older than the signing tolerance.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Event timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Signature header could not be parsed.
    #[error("Malformed signature header: {0}")]
    MalformedHeader(String),

    /// Verified payload could not be decoded into a billing event.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// A required operational setting is absent.
    #[error("Missing configuration: {0}")]
    Configuration(&'static str),

    /// User directory lookup failed.
    #[error("Directory error: {0}")]
    Directory(String),

    /// Subscription store operation failed.
    #[error("Store error: {0}")]
    Store(String),

    /// A downstream dependency did not answer within its deadline.
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
}

impl WebhookError {
    /// Returns the coarse category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            WebhookError::MissingSignature
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp
            | WebhookError::MalformedHeader(_) => ErrorCategory::Authentication,
            WebhookError::MalformedPayload(_) => ErrorCategory::Malformed,
            WebhookError::Configuration(_) => ErrorCategory::Configuration,
            WebhookError::Directory(_) | WebhookError::Store(_) | WebhookError::Timeout(_) => {
                ErrorCategory::Infrastructure
            }
        }
    }

    /// Returns true if Stripe should retry delivering this webhook.
    ///
    /// Retryable errors indicate temporary failures that may succeed
    /// on subsequent attempts with the same event.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Infrastructure
    }

    /// Maps the error to an appropriate HTTP status code.
    ///
    /// Status codes determine Stripe's retry behavior:
    /// - 4xx: the same body will never verify or decode, no point retrying
    /// - 5xx: our side is broken or unconfigured, Stripe redelivers
    pub fn status_code(&self) -> StatusCode {
        match self.category() {
            ErrorCategory::Authentication | ErrorCategory::Malformed => StatusCode::BAD_REQUEST,
            ErrorCategory::Configuration | ErrorCategory::Infrastructure => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code for the response body.
    pub fn error_code(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Authentication => "SIGNATURE_VERIFICATION_FAILED",
            ErrorCategory::Malformed => "MALFORMED_PAYLOAD",
            ErrorCategory::Configuration => "SERVER_MISCONFIGURED",
            ErrorCategory::Infrastructure => "PROCESSING_FAILED",
        }
    }

    /// Message safe to return to the sender.
    ///
    /// Never includes store messages, setting names or secret material.
    pub fn public_message(&self) -> &'static str {
        match self {
            WebhookError::MissingSignature => "Missing Stripe-Signature header",
            WebhookError::InvalidSignature => "Webhook signature verification failed",
            WebhookError::TimestampOutOfRange | WebhookError::InvalidTimestamp => {
                "Webhook timestamp outside tolerance"
            }
            WebhookError::MalformedHeader(_) => "Malformed Stripe-Signature header",
            WebhookError::MalformedPayload(_) => "Webhook payload could not be decoded",
            WebhookError::Configuration(_) => "Webhook endpoint is not configured",
            WebhookError::Directory(_) | WebhookError::Store(_) | WebhookError::Timeout(_) => {
                "Temporary processing failure, retry later"
            }
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    // ══════════════════════════════════════════════════════════════
    // Error Display Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn invalid_signature_displays_correctly() {
        let err = WebhookError::InvalidSignature;
        assert_eq!(format!("{}", err), "Invalid signature");
    }

    #[test]
    fn malformed_payload_displays_message() {
        let err = WebhookError::MalformedPayload("invalid JSON".to_string());
        assert_eq!(format!("{}", err), "Malformed payload: invalid JSON");
    }

    #[test]
    fn configuration_displays_setting_name() {
        let err = WebhookError::Configuration("STRIPE_WEBHOOK_SECRET");
        assert_eq!(
            format!("{}", err),
            "Missing configuration: STRIPE_WEBHOOK_SECRET"
        );
    }

    #[test]
    fn timeout_displays_dependency() {
        let err = WebhookError::Timeout("user directory");
        assert_eq!(format!("{}", err), "Timed out waiting for user directory");
    }

    // ══════════════════════════════════════════════════════════════
    // Retryability Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn infrastructure_errors_are_retryable() {
        assert!(WebhookError::Store("connection failed".to_string()).is_retryable());
        assert!(WebhookError::Directory("lookup failed".to_string()).is_retryable());
        assert!(WebhookError::Timeout("subscription store").is_retryable());
    }

    #[test]
    fn authentication_errors_are_not_retryable() {
        assert!(!WebhookError::MissingSignature.is_retryable());
        assert!(!WebhookError::InvalidSignature.is_retryable());
        assert!(!WebhookError::TimestampOutOfRange.is_retryable());
        assert!(!WebhookError::InvalidTimestamp.is_retryable());
        assert!(!WebhookError::MalformedHeader("x".to_string()).is_retryable());
    }

    #[test]
    fn configuration_error_is_not_attributed_to_sender() {
        let err = WebhookError::Configuration("DATABASE_URL");
        assert!(!err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    // ══════════════════════════════════════════════════════════════
    // Status Code Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn signature_failures_return_bad_request() {
        for err in [
            WebhookError::MissingSignature,
            WebhookError::InvalidSignature,
            WebhookError::TimestampOutOfRange,
            WebhookError::InvalidTimestamp,
            WebhookError::MalformedHeader("no t".to_string()),
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn malformed_payload_returns_bad_request() {
        let err = WebhookError::MalformedPayload("missing id".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn configuration_error_returns_internal_error() {
        let err = WebhookError::Configuration("STRIPE_SECRET_KEY");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn store_error_returns_internal_error() {
        let err = WebhookError::Store("connection lost".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    // ══════════════════════════════════════════════════════════════
    // Public Message Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn public_message_hides_internal_details() {
        let err = WebhookError::Store("password authentication failed for user admin".to_string());
        assert!(!err.public_message().contains("password"));

        let err = WebhookError::Configuration("DATABASE_SERVICE_ROLE_KEY");
        assert!(!err.public_message().contains("SERVICE_ROLE"));
    }

    #[test]
    fn domain_error_converts_to_store_error() {
        let err: WebhookError =
            DomainError::new(ErrorCode::DatabaseError, "deadlock detected").into();
        assert!(matches!(err, WebhookError::Store(ref m) if m.contains("deadlock")));
    }
}
