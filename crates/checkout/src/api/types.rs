//! Wire shapes of the marketplace data service.
//!
//! Only types whose JSON differs from the domain types live here; orders,
//! addresses and cities decode straight into their domain types.

use marketplace_core::{CartItemId, Money, OrderId, ProductId, StoreId};
use serde::{Deserialize, Serialize};

/// `GET /cart`
#[derive(Debug, Deserialize)]
pub struct CartResponse {
    #[serde(default)]
    pub stores: Vec<CartStoreGroup>,
}

#[derive(Debug, Deserialize)]
pub struct CartStoreGroup {
    pub store_id: StoreId,
    pub store_name: String,
    #[serde(default)]
    pub store_whatsapp: Option<String>,
    #[serde(default = "default_checkout_enabled")]
    pub checkout_enabled: bool,
    #[serde(default)]
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub total: Option<Money>,
}

const fn default_checkout_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    /// Units in stock; absent when the store does not track stock.
    #[serde(default)]
    pub stock: Option<u32>,
}

/// `PUT /cart/items/{id}`
#[derive(Debug, Serialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

/// `GET /stores/{id}/payment-methods`
#[derive(Debug, Deserialize)]
pub struct PaymentMethodsResponse {
    #[serde(default)]
    pub payment_methods: Vec<String>,
}

/// `POST /payments/create-preference`
#[derive(Debug, Serialize)]
pub struct PreferenceRequest {
    pub order_id: OrderId,
    pub store_id: StoreId,
}

/// Error body; services disagree on the field name.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
    pub detail: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message
            .or(self.error)
            .or(self.detail)
            .filter(|m| !m.trim().is_empty())
    }
}
