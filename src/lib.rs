//! Subscription Sync - Payment provider webhook receiver
//!
//! Verifies Stripe webhook deliveries, decodes them into typed billing
//! events and reconciles them into one subscription record per user.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
