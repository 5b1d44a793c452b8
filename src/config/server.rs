//! Server configuration

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use super::error::ValidationError;

/// Sequential dependency calls one delivery may make (directory, then store).
const DEPENDENCY_CALLS_PER_REQUEST: u64 = 2;

/// Slack left between the last dependency deadline and the request deadline.
const REQUEST_DEADLINE_HEADROOM_MS: u64 = 1_000;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment name
    #[serde(default = "default_environment")]
    pub environment: Environment,

    /// Log filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whole-request deadline in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Deadline for each directory or store call, in milliseconds
    #[serde(default = "default_dependency_timeout")]
    pub dependency_timeout_ms: u64,

    /// Maximum accepted webhook body size
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

/// Application environment
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl ServerConfig {
    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> Result<SocketAddr, ValidationError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ValidationError::InvalidSocketAddress)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn dependency_timeout(&self) -> Duration {
        Duration::from_millis(self.dependency_timeout_ms)
    }

    /// Validate server configuration
    ///
    /// The request deadline must outlast every dependency call of one
    /// delivery plus headroom, so dependency timeouts surface as
    /// retryable errors from the pipeline.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        self.socket_addr()?;
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        let budget_ms = self
            .dependency_timeout_ms
            .saturating_mul(DEPENDENCY_CALLS_PER_REQUEST)
            .saturating_add(REQUEST_DEADLINE_HEADROOM_MS);
        if self.dependency_timeout_ms == 0
            || budget_ms > self.request_timeout_secs.saturating_mul(1000)
        {
            return Err(ValidationError::InvalidDependencyTimeout);
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout(),
            dependency_timeout_ms: default_dependency_timeout(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_environment() -> Environment {
    Environment::Development
}

fn default_log_level() -> String {
    "info,subscription_sync=debug,sqlx=warn".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_dependency_timeout() -> u64 {
    5_000
}

fn default_body_limit() -> usize {
    1024 * 1024
}
