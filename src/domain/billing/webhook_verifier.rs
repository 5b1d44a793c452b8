//! Stripe webhook signature verification.
//!
//! Implements secure verification of Stripe webhook signatures using HMAC-SHA256.
//! Includes timestamp validation to prevent replay attacks.
//!
//! The MAC is computed over the exact request bytes. A body that was parsed and
//! re-serialized will not verify, so verification must happen before any decoding.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::webhook_errors::WebhookError;

/// Default maximum age for webhook events (5 minutes).
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parsed components from the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp when the signature was generated.
    pub timestamp: i64,
    /// v1 signatures (HMAC-SHA256). More than one is sent while a secret is rolled.
    pub v1_signatures: Vec<Vec<u8>>,
    /// Optional v0 legacy signature. Parsed but never trusted.
    pub v0_signature: Option<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses a Stripe-Signature header string.
    ///
    /// Format: `t=<timestamp>,v1=<signature>[,v1=<signature>][,v0=<legacy>]`
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::MalformedHeader` if the header format is invalid.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures: Vec<Vec<u8>> = Vec::new();
        let mut v0_signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| WebhookError::MalformedHeader("invalid header format".to_string()))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::MalformedHeader("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signatures.push(hex::decode(value).map_err(|_| {
                        WebhookError::MalformedHeader("invalid v1 signature hex".to_string())
                    })?);
                }
                "v0" => {
                    v0_signature = Some(hex::decode(value).map_err(|_| {
                        WebhookError::MalformedHeader("invalid v0 signature hex".to_string())
                    })?);
                }
                _ => {
                    // Ignore unknown fields for forward compatibility
                }
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| WebhookError::MalformedHeader("missing timestamp".to_string()))?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::MalformedHeader(
                "missing v1 signature".to_string(),
            ));
        }

        Ok(SignatureHeader {
            timestamp,
            v1_signatures,
            v0_signature,
        })
    }
}

/// Payload bytes whose signature has been checked.
///
/// Only [`StripeWebhookVerifier`] can produce one, so decoding an
/// unauthenticated body does not type-check.
#[derive(Debug, Clone)]
pub struct VerifiedPayload {
    bytes: Vec<u8>,
    signed_at: i64,
}

impl VerifiedPayload {
    /// The exact bytes that were signed.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Unix time carried in the signature header.
    pub fn signed_at(&self) -> i64 {
        self.signed_at
    }

    /// Consumes the payload, returning the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Wraps bytes without verification, for decoder tests.
    #[cfg(test)]
    pub(crate) fn trusted(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            signed_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Verifier for Stripe webhook signatures.
pub struct StripeWebhookVerifier {
    /// The webhook signing secret from Stripe dashboard.
    secret: String,
    /// Maximum accepted age of a signature, in seconds.
    tolerance_secs: i64,
}

impl StripeWebhookVerifier {
    /// Creates a new verifier with the given webhook secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Overrides the signing window.
    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verifies the webhook signature against the current clock.
    pub fn verify(
        &self,
        payload: Vec<u8>,
        signature_header: &str,
    ) -> Result<VerifiedPayload, WebhookError> {
        self.verify_at(payload, signature_header, chrono::Utc::now().timestamp())
    }

    /// Verifies the webhook signature as of `now` (Unix seconds).
    ///
    /// # Verification Steps
    ///
    /// 1. Parse the signature header
    /// 2. Validate timestamp is within acceptable range
    /// 3. Compute expected signature using HMAC-SHA256 over the raw bytes
    /// 4. Compare against every v1 signature in constant time
    ///
    /// # Errors
    ///
    /// - `MalformedHeader` - Header could not be parsed
    /// - `TimestampOutOfRange` - Signature is older than the tolerance
    /// - `InvalidTimestamp` - Signature timestamp is in the future
    /// - `InvalidSignature` - No v1 signature matched
    pub fn verify_at(
        &self,
        payload: Vec<u8>,
        signature_header: &str,
        now: i64,
    ) -> Result<VerifiedPayload, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;

        self.validate_timestamp(header.timestamp, now)?;

        let expected = compute_signature(self.secret.as_bytes(), header.timestamp, &payload)?;

        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate));
        if !matched {
            return Err(WebhookError::InvalidSignature);
        }

        Ok(VerifiedPayload {
            bytes: payload,
            signed_at: header.timestamp,
        })
    }

    /// Validates that the timestamp is within acceptable bounds.
    fn validate_timestamp(&self, timestamp: i64, now: i64) -> Result<(), WebhookError> {
        let age = now.saturating_sub(timestamp);

        if age > self.tolerance_secs {
            return Err(WebhookError::TimestampOutOfRange);
        }

        if age < -MAX_CLOCK_SKEW_SECS {
            return Err(WebhookError::InvalidTimestamp);
        }

        Ok(())
    }
}

/// Computes the HMAC-SHA256 signature for the given timestamp and payload.
fn compute_signature(secret: &[u8], timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret).map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Performs constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Builds a `Stripe-Signature` header value for `payload`.
///
/// Used by tests and local tooling that replays captured events.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
    let signature = compute_signature(secret.as_bytes(), timestamp, payload)?;
    Ok(format!("t={},v1={}", timestamp, hex::encode(signature)))
}
