//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `UserDirectory` - Email to user identity lookup
//! - `SubscriptionStore` - Guarded subscription record writes

mod subscription_store;
mod user_directory;

pub use subscription_store::SubscriptionStore;
pub use user_directory::UserDirectory;
