//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `http` - Axum webhook endpoint
//! - `postgres` - PostgreSQL store and user directory
//! - `memory` - In-memory store and directory for tests and local runs

pub mod http;
pub mod memory;
pub mod postgres;

pub use memory::{InMemorySubscriptionStore, InMemoryUserDirectory};
pub use postgres::{PostgresSubscriptionStore, PostgresUserDirectory};
