//! Orders, submission payloads and gateway payment preferences.

use chrono::{DateTime, Utc};
use marketplace_core::{
    AddressId, CartItemId, Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
    StoreId,
};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::address::{AddressDraft, ResolvedAddress};
use crate::cart::StoreCartGroup;

/// One line of a created order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// How to pay for an order, as returned by the order service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentInfo {
    pub pix_key: Option<String>,
    /// Base64 PNG of the PIX QR code.
    pub pix_qr_image: Option<String>,
    pub pix_copy_paste_text: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub payment_link: Option<String>,
    pub instructions: Option<String>,
}

impl PaymentInfo {
    /// Whether the shopper can pay in place, without a gateway redirect.
    #[must_use]
    pub fn has_inline_instructions(&self) -> bool {
        [&self.pix_copy_paste_text, &self.pix_qr_image, &self.pix_key]
            .into_iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

/// A created order. Status fields are owned by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub store_id: StoreId,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    #[serde(default)]
    pub shipping_cost: Option<Money>,
    pub total: Money,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_info: Option<PaymentInfo>,
    #[serde(default)]
    pub shipping_address: Option<AddressDraft>,
    #[serde(default)]
    pub store_whatsapp: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether the order is paid through the gateway and still unsettled.
    #[must_use]
    pub fn awaits_gateway_payment(&self) -> bool {
        self.payment_method == Some(PaymentMethod::Gateway)
            && !self.payment_status.is_settled()
            && !self.payment_status.is_failed()
            && self.status != OrderStatus::Cancelled
    }

    /// Inline PIX data, if the order carries any.
    #[must_use]
    pub fn inline_payment(&self) -> Option<&PaymentInfo> {
        self.payment_info
            .as_ref()
            .filter(|info| info.has_inline_instructions())
    }
}

/// Where the order ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ShippingTarget {
    #[serde(rename = "shipping_address_id")]
    Saved(AddressId),
    #[serde(rename = "shipping_address")]
    New(AddressDraft),
}

impl From<&ResolvedAddress> for ShippingTarget {
    fn from(address: &ResolvedAddress) -> Self {
        match address {
            ResolvedAddress::Saved(saved) => Self::Saved(saved.id),
            ResolvedAddress::New(draft) => Self::New(draft.clone()),
        }
    }
}

/// One cart line in a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadItem {
    pub cart_item_id: CartItemId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of an order creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutPayload {
    pub store_id: StoreId,
    #[serde(flatten)]
    pub shipping: ShippingTarget,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub items: Vec<PayloadItem>,
    /// Sent as the `Idempotency-Key` header, not in the body.
    #[serde(skip)]
    pub idempotency_key: Uuid,
}

impl CheckoutPayload {
    /// Build a payload for a seller-group with a fresh idempotency key.
    #[must_use]
    pub fn new(
        group: &StoreCartGroup,
        address: &ResolvedAddress,
        payment_method: PaymentMethod,
        notes: Option<&str>,
    ) -> Self {
        Self {
            store_id: group.store_id,
            shipping: ShippingTarget::from(address),
            payment_method,
            notes: notes
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            items: group
                .items
                .iter()
                .map(|item| PayloadItem {
                    cart_item_id: item.id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
            idempotency_key: Uuid::new_v4(),
        }
    }

    /// Replace the generated key with one kept across resubmissions.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: Uuid) -> Self {
        self.idempotency_key = key;
        self
    }
}

/// Hosted checkout created by the payment gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentPreference {
    pub init_point: Option<String>,
    pub sandbox_init_point: Option<String>,
}

impl PaymentPreference {
    /// The URL to send the shopper to.
    ///
    /// Sandbox mode prefers `sandbox_init_point`; either mode falls back to
    /// whichever link is present.
    #[must_use]
    pub fn redirect_url(&self, use_sandbox: bool) -> Option<Url> {
        let (first, second) = if use_sandbox {
            (&self.sandbox_init_point, &self.init_point)
        } else {
            (&self.init_point, &self.sandbox_init_point)
        };
        first
            .iter()
            .chain(second)
            .find_map(|link| Url::parse(link.trim()).ok())
    }
}
