//! Larkspur Core - cart store and shared types.
//!
//! This crate provides the pieces shared by every Larkspur component:
//! - `storefront` - HTTP cart service and checkout handoff
//! - `cli` - Command-line access to a persisted cart snapshot
//!
//! # Architecture
//!
//! The core crate performs no network I/O. The only side effect it knows about
//! is the [`cart::CartStorage`] seam, which the cart store calls after every
//! mutation. Concrete backends (files, in-memory) live with their consumers.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for product ids, variant keys, and prices
//! - [`cart`] - Line items, cart state, the cart store, and its storage seam
//! - [`checkout`] - Payment-link request payload built from a cart snapshot

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod types;

pub use cart::{
    CartError, CartLineItem, CartState, CartStorage, CartStore, MAX_LINE_QUANTITY, MAX_UNIT_PRICE,
    StorageError,
};
pub use types::*;
