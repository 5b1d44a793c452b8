//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `billing` - Webhook verification, event decoding and subscription reconciliation

pub mod billing;
pub mod foundation;
