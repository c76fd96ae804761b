//! Paying for an existing order outside the checkout dialog.
//!
//! Used by the order detail page and the "my orders" list when a gateway
//! payment was abandoned or its preference could not be created.

use marketplace_core::{OrderId, StoreId};
use tracing::{info, instrument};
use url::Url;

use crate::config::FlowSettings;
use crate::error::{CheckoutError, Result, add_breadcrumb};
use crate::order::Order;
use crate::ports::{OrderService, Services};

/// Request a new hosted payment for an existing order and navigate to it.
///
/// # Errors
///
/// - `Validation` if the order is already paid.
/// - `Provider` if the gateway returns no usable checkout link.
/// - Any order service error.
#[instrument(skip(services, settings))]
pub async fn retry_payment(
    services: &Services,
    settings: &FlowSettings,
    order_id: OrderId,
    store_id: StoreId,
) -> Result<Url> {
    let order = services.orders.get_order(order_id).await?;
    if order.payment_status.is_settled() {
        return Err(CheckoutError::Validation(format!(
            "O pedido #{order_id} já está pago"
        )));
    }

    let url = services
        .orders
        .create_payment_preference(order_id, store_id)
        .await?
        .redirect_url(settings.use_sandbox)
        .ok_or_else(|| CheckoutError::Provider {
            order_id,
            message: "payment preference has no checkout link".to_string(),
        })?;

    info!(%order_id, "Payment retry redirect");
    add_breadcrumb(
        "payment",
        "Payment retried",
        &[("order_id", order_id.to_string())],
    );
    services.navigator.navigate(&url);
    Ok(url)
}

/// The shopper's gateway orders still waiting for payment.
///
/// # Errors
///
/// Returns the order service error.
pub async fn pending_gateway_orders(orders: &dyn OrderService) -> Result<Vec<Order>> {
    Ok(orders
        .list_orders()
        .await?
        .into_iter()
        .filter(Order::awaits_gateway_payment)
        .collect())
}
