use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subscription_sync::adapters::http::{billing_router, BillingAppState};
use subscription_sync::adapters::postgres::{self, PostgresSubscriptionStore, PostgresUserDirectory};
use subscription_sync::application::HandleBillingWebhookHandler;
use subscription_sync::config::{AppConfig, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.server);

    config.validate().context("Invalid configuration")?;
    if let Err(missing) = config.required_settings() {
        // Requests will be refused with a configuration error until fixed
        tracing::warn!(error = %missing, "Webhook endpoint is not fully configured");
    }

    let pool = postgres::lazy_pool(&config.database).context("Invalid database URL")?;
    if config.database.run_migrations {
        tracing::info!("Running migrations...");
        postgres::run_migrations(&pool)
            .await
            .context("Failed to run migrations")?;
    }

    let addr = config.server.socket_addr()?;
    let config = Arc::new(config);

    let handler = HandleBillingWebhookHandler::new(
        config.clone(),
        Arc::new(PostgresUserDirectory::new(pool.clone())),
        Arc::new(PostgresSubscriptionStore::new(pool.clone())),
    )
    .context("Failed to build webhook handler")?;
    let app = billing_router(BillingAppState::new(handler), &config.server);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
