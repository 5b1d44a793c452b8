//! Payment configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::billing::DEFAULT_TOLERANCE_SECS;

/// Payment configuration (Stripe)
#[derive(Debug, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key. Only its mode prefix is used by this service.
    pub stripe_secret_key: Option<SecretString>,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: Option<SecretString>,

    /// Maximum accepted age of a signature, in seconds
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.key_has_prefix(&["sk_test_", "rk_test_"])
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.key_has_prefix(&["sk_live_", "rk_live_"])
    }

    fn key_has_prefix(&self, prefixes: &[&str]) -> bool {
        self.stripe_secret_key.as_ref().is_some_and(|key| {
            let key = key.expose_secret();
            prefixes.iter().any(|p| key.starts_with(p))
        })
    }

    /// Validate payment configuration
    ///
    /// Absent keys are reported by `AppConfig::required_settings`, not here.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(key) = &self.stripe_secret_key {
            let key = key.expose_secret();
            if !key.starts_with("sk_") && !key.starts_with("rk_") {
                return Err(ValidationError::InvalidStripeKey);
            }
        }
        if let Some(secret) = &self.stripe_webhook_secret {
            if !secret.expose_secret().starts_with("whsec_") {
                return Err(ValidationError::InvalidStripeWebhookSecret);
            }
        }
        if !(1..=3600).contains(&self.signature_tolerance_secs) {
            return Err(ValidationError::InvalidSignatureTolerance);
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            signature_tolerance_secs: default_signature_tolerance(),
        }
    }
}

fn default_signature_tolerance() -> i64 {
    DEFAULT_TOLERANCE_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: &str, secret: &str) -> PaymentConfig {
        PaymentConfig {
            stripe_secret_key: Some(SecretString::new(key.to_string())),
            stripe_webhook_secret: Some(SecretString::new(secret.to_string())),
            ..Default::default()
        }
    }

    #[test]
    fn test_is_test_mode() {
        let config = config("sk_test_xxx", "whsec_xxx");
        assert!(config.is_test_mode());
        assert!(!config.is_live_mode());
    }

    #[test]
    fn test_is_live_mode() {
        let config = config("sk_live_xxx", "whsec_xxx");
        assert!(config.is_live_mode());
        assert!(!config.is_test_mode());
    }

    #[test]
    fn test_missing_key_is_neither_mode() {
        let config = PaymentConfig::default();
        assert!(!config.is_live_mode());
        assert!(!config.is_test_mode());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_api_key_prefix() {
        let config = config("pk_test_xxx", "whsec_xxx");
        assert_eq!(config.validate(), Err(ValidationError::InvalidStripeKey));
    }

    #[test]
    fn test_validation_invalid_webhook_secret_prefix() {
        let config = config("sk_test_xxx", "secret_xxx");
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );
    }

    #[test]
    fn test_validation_tolerance_bounds() {
        let mut config = config("sk_test_xxx", "whsec_xxx");
        config.signature_tolerance_secs = 0;
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidSignatureTolerance)
        );
    }

    #[test]
    fn test_validation_valid_config() {
        let config = config("rk_live_abcd1234", "whsec_xyz789");
        assert!(config.validate().is_ok());
    }
}
