//! Marketplace checkout library.
//!
//! Turns one seller-group of a multi-vendor cart into an order and follows
//! it until payment is confirmed or handed off to the seller.
//!
//! # Modules
//!
//! - [`cart`] - Cart aggregate grouped by store, quantity rules
//! - [`address`] - Saved addresses, drafts, validation and selection
//! - [`payment_methods`] - Per-store payment method negotiation
//! - [`order`] - Orders, checkout payloads and payment preferences
//! - [`orchestrator`] - The checkout state machine
//! - [`handoff`] - Direct-message order handoff
//! - [`watcher`] - Cancellable payment confirmation polling
//! - [`payments`] - Paying for existing orders
//! - [`api`] - HTTP client implementing every data-service port
//! - [`ports`] - Collaborator traits

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod api;
pub mod cart;
pub mod config;
pub mod error;
pub mod handoff;
pub mod orchestrator;
pub mod order;
pub mod payment_methods;
pub mod payments;
pub mod ports;
pub mod session;
pub mod telemetry;
pub mod watcher;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::ApiClient;
pub use cart::{CartAggregate, CartItem, CartStore, StoreCartGroup};
pub use config::{CheckoutConfig, ConfigError, FlowSettings};
pub use error::{CheckoutError, ErrorKind, Result};
pub use orchestrator::{CheckoutOrchestrator, CheckoutState, SubmitOutcome};
pub use order::{CheckoutPayload, Order, PaymentInfo, PaymentPreference};
pub use ports::{Navigator, Notice, Services};
pub use session::{CheckoutSession, SessionContext};
pub use watcher::{PaymentWatch, WatchConfig, WatchOutcome};
