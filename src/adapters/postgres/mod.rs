//! PostgreSQL adapters - Database implementations for the store and directory ports.
//!
//! - `PostgresSubscriptionStore` - Guarded subscription record writes
//! - `PostgresUserDirectory` - Email lookup against `auth.users`

mod subscription_store;
mod user_directory;

pub use subscription_store::PostgresSubscriptionStore;
pub use user_directory::PostgresUserDirectory;

use secrecy::ExposeSecret;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;

use crate::config::DatabaseConfig;

/// Builds a pool that connects on first use.
///
/// The service role key, when set, is applied as the connection password.
/// A missing URL yields libpq-style defaults; requests are refused earlier
/// by the settings check, so such a pool is never used.
///
/// # Errors
///
/// Returns an error if the URL cannot be parsed.
pub fn lazy_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let mut options = match &config.url {
        Some(url) => PgConnectOptions::from_str(url.expose_secret())?,
        None => PgConnectOptions::new(),
    };
    if let Some(key) = &config.service_role_key {
        options = options.password(key.expose_secret());
    }

    Ok(PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(Some(config.idle_timeout()))
        .max_lifetime(Some(config.max_lifetime()))
        .connect_lazy_with(options))
}

/// Applies the embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn invalid_url_is_rejected() {
        let config = DatabaseConfig {
            url: Some(SecretString::new("not a url".to_string())),
            ..Default::default()
        };
        assert!(lazy_pool(&config).is_err());
    }

    #[tokio::test]
    async fn pool_is_built_without_connecting() {
        let config = DatabaseConfig {
            url: Some(SecretString::new(
                "postgresql://postgres@127.0.0.1:1/app".to_string(),
            )),
            service_role_key: Some(SecretString::new("role-key".to_string())),
            ..Default::default()
        };

        let pool = lazy_pool(&config).unwrap();

        assert_eq!(pool.size(), 0);
    }
}
