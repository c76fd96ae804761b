//! Collaborator ports consumed by the checkout.
//!
//! Each trait is one external service. [`crate::api::ApiClient`] implements
//! all of the data-service ports over HTTP; the `testing` feature provides
//! in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use marketplace_core::{AddressId, CartItemId, OrderId, PaymentMethod, StoreId};
use url::Url;

use crate::address::{AddressDraft, City, ShippingAddress};
use crate::cart::CartAggregate;
use crate::error::Result;
use crate::order::{CheckoutPayload, Order, PaymentPreference};

#[async_trait]
pub trait CartService: Send + Sync {
    async fn get_cart(&self) -> Result<CartAggregate>;
    async fn update_item_quantity(&self, item_id: CartItemId, quantity: u32) -> Result<()>;
    async fn remove_item(&self, item_id: CartItemId) -> Result<()>;
}

#[async_trait]
pub trait AddressService: Send + Sync {
    async fn list_addresses(&self) -> Result<Vec<ShippingAddress>>;
    async fn create_address(&self, draft: &AddressDraft) -> Result<ShippingAddress>;
    async fn update_address(&self, id: AddressId, draft: &AddressDraft) -> Result<ShippingAddress>;
    async fn set_default_address(&self, id: AddressId) -> Result<()>;
}

#[async_trait]
pub trait CityService: Send + Sync {
    async fn list_cities(&self) -> Result<Vec<City>>;
}

#[async_trait]
pub trait PaymentMethodService: Send + Sync {
    /// Raw accepted methods for a store, in the store's preferred order.
    async fn accepted_methods(&self, store_id: StoreId) -> Result<Vec<PaymentMethod>>;
}

/// The order submission gateway.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Fails with `Validation` on a malformed payload and `Conflict` when the
    /// store's items are no longer in the cart.
    async fn create_order(&self, payload: &CheckoutPayload) -> Result<Order>;
    /// Fails with `Provider` when the gateway rejects the preference.
    async fn create_payment_preference(
        &self,
        order_id: OrderId,
        store_id: StoreId,
    ) -> Result<PaymentPreference>;
    async fn get_order(&self, order_id: OrderId) -> Result<Order>;
    async fn list_orders(&self) -> Result<Vec<Order>>;
}

/// Shopper-facing notice raised by the checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Gateway payment settled.
    PaymentConfirmed { order_id: OrderId },
    /// A recoverable error to show as a toast.
    Error { message: String },
}

/// Hooks into the presentation layer.
///
/// All methods are fire-and-forget: the checkout never waits on them and
/// never learns whether the browser honored them (pop-up blockers included).
pub trait Navigator: Send + Sync {
    /// Leave the current page for `url`.
    fn navigate(&self, url: &Url);
    /// Open `url` in a new browsing context.
    fn open_external(&self, url: &Url);
    /// Show a notice to the shopper.
    fn notify(&self, notice: Notice);
}

/// Shared handles to every collaborator.
#[derive(Clone)]
pub struct Services {
    pub cart: Arc<dyn CartService>,
    pub addresses: Arc<dyn AddressService>,
    pub cities: Arc<dyn CityService>,
    pub payment_methods: Arc<dyn PaymentMethodService>,
    pub orders: Arc<dyn OrderService>,
    pub navigator: Arc<dyn Navigator>,
}

impl Services {
    /// Wire every data-service port to the same implementation.
    #[must_use]
    pub fn from_client<C>(client: C, navigator: Arc<dyn Navigator>) -> Self
    where
        C: CartService
            + AddressService
            + CityService
            + PaymentMethodService
            + OrderService
            + Clone
            + 'static,
    {
        Self {
            cart: Arc::new(client.clone()),
            addresses: Arc::new(client.clone()),
            cities: Arc::new(client.clone()),
            payment_methods: Arc::new(client.clone()),
            orders: Arc::new(client),
            navigator,
        }
    }
}
