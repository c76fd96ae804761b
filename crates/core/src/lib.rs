//! Marketplace Core - Shared value types.
//!
//! This crate provides the value types shared by the checkout crate and its
//! integration tests:
//! - `checkout` - Cart checkout orchestration and payment confirmation
//! - `integration-tests` - End-to-end checkout scenarios
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, zip codes, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
