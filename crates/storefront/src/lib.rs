//! Larkspur Storefront library.
//!
//! Session-scoped cart service over HTTP plus the payment-link checkout
//! handoff. Exposed as a library so the router can be driven in tests.
//!
//! # Modules
//!
//! - [`config`] - Environment configuration
//! - [`storage`] - JSON file backend for cart snapshots
//! - [`registry`] - Per-session cart stores
//! - [`payments`] - Payment-link provider client
//! - [`summary`] - Order summary math
//! - [`routes`] - HTTP handlers and router assembly

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod registry;
pub mod routes;
pub mod state;
pub mod storage;
pub mod summary;
