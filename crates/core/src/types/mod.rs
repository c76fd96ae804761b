//! Core types for the marketplace checkout.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod payment;
pub mod status;
pub mod zip_code;

pub use id::*;
pub use money::Money;
pub use payment::PaymentMethod;
pub use status::*;
pub use zip_code::{ZipCode, ZipCodeError};
