//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `SUBSCRIPTION_SYNC` prefix and nested values use double underscores as separators.
//!
//! Loading never fails because a secret is absent. The four operational
//! settings the webhook needs are checked per request through
//! [`AppConfig::required_settings`], so a misconfigured deployment answers
//! with a server error instead of refusing to start.
//!
//! # Example
//!
//! ```no_run
//! use subscription_sync::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {:?}", config.server.socket_addr());
//! ```

mod database;
mod error;
mod payment;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use server::{Environment, ServerConfig};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Root application configuration
///
/// Holds secrets, so it is shared behind an `Arc` rather than cloned.
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, deadlines)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Payment configuration (Stripe)
    #[serde(default)]
    pub payment: PaymentConfig,
}

/// Borrowed view of the settings every webhook request needs.
#[derive(Debug)]
pub struct RequiredSettings<'a> {
    pub stripe_secret_key: &'a SecretString,
    pub stripe_webhook_secret: &'a SecretString,
    pub database_url: &'a SecretString,
    pub database_service_role_key: &'a SecretString,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `SUBSCRIPTION_SYNC` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `SUBSCRIPTION_SYNC__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SUBSCRIPTION_SYNC__PAYMENT__STRIPE_WEBHOOK_SECRET=...` -> `payment.stripe_webhook_secret`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SUBSCRIPTION_SYNC")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate the format of every configured value
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any present value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate()?;
        Ok(())
    }

    /// The operational settings a webhook request cannot proceed without.
    ///
    /// Empty values count as missing.
    ///
    /// # Errors
    ///
    /// `MissingRequired` naming the first absent setting.
    pub fn required_settings(&self) -> Result<RequiredSettings<'_>, ValidationError> {
        Ok(RequiredSettings {
            stripe_secret_key: present(&self.payment.stripe_secret_key, "STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: present(
                &self.payment.stripe_webhook_secret,
                "STRIPE_WEBHOOK_SECRET",
            )?,
            database_url: present(&self.database.url, "DATABASE_URL")?,
            database_service_role_key: present(
                &self.database.service_role_key,
                "DATABASE_SERVICE_ROLE_KEY",
            )?,
        })
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

fn present<'a>(
    value: &'a Option<SecretString>,
    name: &'static str,
) -> Result<&'a SecretString, ValidationError> {
    value
        .as_ref()
        .filter(|v| !v.expose_secret().trim().is_empty())
        .ok_or(ValidationError::MissingRequired(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 6] = [
        "SUBSCRIPTION_SYNC__PAYMENT__STRIPE_SECRET_KEY",
        "SUBSCRIPTION_SYNC__PAYMENT__STRIPE_WEBHOOK_SECRET",
        "SUBSCRIPTION_SYNC__DATABASE__URL",
        "SUBSCRIPTION_SYNC__DATABASE__SERVICE_ROLE_KEY",
        "SUBSCRIPTION_SYNC__SERVER__PORT",
        "SUBSCRIPTION_SYNC__SERVER__ENVIRONMENT",
    ];

    fn set_full_env() {
        env::set_var(VARS[0], "sk_test_xxx");
        env::set_var(VARS[1], "whsec_xxx");
        env::set_var(VARS[2], "postgresql://postgres@localhost/test");
        env::set_var(VARS[3], "service-role-key");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn secret(value: &str) -> Option<SecretString> {
        Some(SecretString::new(value.to_string()))
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_full_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.required_settings().is_ok());
        assert!(config.validate().is_ok());
        assert_eq!(
            config.database.url.as_ref().unwrap().expose_secret(),
            "postgresql://postgres@localhost/test"
        );
    }

    #[test]
    fn test_load_without_secrets_succeeds() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        let config = result.unwrap();
        assert_eq!(
            config.required_settings().unwrap_err(),
            ValidationError::MissingRequired("STRIPE_SECRET_KEY")
        );
    }

    #[test]
    fn test_server_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_full_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_full_env();
        env::set_var("SUBSCRIPTION_SYNC__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().is_production());
    }

    #[test]
    fn test_custom_server_port() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_full_env();
        env::set_var("SUBSCRIPTION_SYNC__SERVER__PORT", "3000");
        let result = AppConfig::load();
        clear_env();

        assert_eq!(result.unwrap().server.port, 3000);
    }

    #[test]
    fn test_required_settings_reports_first_missing() {
        let mut config = AppConfig::default();
        config.payment.stripe_secret_key = secret("sk_test_xxx");
        config.payment.stripe_webhook_secret = secret("whsec_xxx");
        config.database.url = secret("postgresql://localhost/test");

        assert_eq!(
            config.required_settings().unwrap_err(),
            ValidationError::MissingRequired("DATABASE_SERVICE_ROLE_KEY")
        );
    }

    #[test]
    fn test_empty_setting_counts_as_missing() {
        let mut config = AppConfig::default();
        config.payment.stripe_secret_key = secret("sk_test_xxx");
        config.payment.stripe_webhook_secret = secret("  ");

        assert_eq!(
            config.required_settings().unwrap_err(),
            ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET")
        );
    }
}
