//! In-memory adapters.
//!
//! Same semantics as the PostgreSQL adapters, backed by a `HashMap` behind
//! a single write lock. Used by tests and for local runs without a
//! database. Each adapter can be switched into an unavailable mode in
//! which every call fails like a lost connection.

mod subscription_store;
mod user_directory;

pub use subscription_store::InMemorySubscriptionStore;
pub use user_directory::InMemoryUserDirectory;
