//! Conversions from wire shapes to domain types.

use marketplace_core::PaymentMethod;
use tracing::debug;

use super::types::{CartLine, CartResponse, CartStoreGroup, ErrorBody};
use crate::cart::{CartAggregate, CartItem, StoreCartGroup};
use crate::error::Result;

/// Convert the cart response, dropping zero-quantity lines.
///
/// Line subtotals are always recomputed from unit price and quantity.
pub fn convert_cart(response: CartResponse) -> Result<CartAggregate> {
    CartAggregate::new(response.stores.into_iter().map(convert_group).collect())
}

fn convert_group(group: CartStoreGroup) -> StoreCartGroup {
    let items: Vec<CartItem> = group.items.into_iter().filter_map(convert_line).collect();
    let total = group
        .total
        .unwrap_or_else(|| items.iter().map(|i| i.subtotal).sum());
    StoreCartGroup {
        store_id: group.store_id,
        store_name: group.store_name,
        store_whatsapp: group.store_whatsapp.filter(|w| !w.trim().is_empty()),
        checkout_enabled: group.checkout_enabled,
        items,
        total,
    }
}

fn convert_line(line: CartLine) -> Option<CartItem> {
    if line.quantity == 0 {
        debug!(item_id = %line.id, "Skipping zero-quantity cart line");
        return None;
    }
    // Stock may have dropped below the reserved quantity; keep the line as
    // the service reports it.
    Some(CartItem {
        id: line.id,
        product_id: line.product_id,
        name: line.product_name,
        unit_price: line.unit_price,
        quantity: line.quantity,
        subtotal: line.unit_price.times(line.quantity),
        stock_limit: line.stock,
    })
}

/// Map method names to known channels, ignoring unknown ones.
pub fn convert_payment_methods(names: &[String]) -> Vec<PaymentMethod> {
    names
        .iter()
        .filter_map(|name| {
            let method = PaymentMethod::from_wire(name);
            if method.is_none() {
                debug!(method = %name, "Ignoring unknown payment method");
            }
            method
        })
        .collect()
}

/// Best human-readable message in an error response body.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marketplace_core::{Money, StoreId};
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_convert_cart_recomputes_subtotals() {
        let response: CartResponse = serde_json::from_value(json!({
            "stores": [{
                "store_id": 4,
                "store_name": "Doces da Vó",
                "store_whatsapp": "",
                "items": [
                    {"id": 1, "product_id": 10, "product_name": "Brigadeiro", "unit_price": "2.50", "quantity": 12},
                    {"id": 2, "product_id": 11, "product_name": "Beijinho", "unit_price": "2.50", "quantity": 0},
                ],
            }],
        }))
        .unwrap();

        let cart = convert_cart(response).unwrap();
        let group = cart.group(StoreId::new(4)).unwrap();
        assert!(group.checkout_enabled);
        assert!(group.store_whatsapp.is_none());
        assert_eq!(group.items.len(), 1);
        assert_eq!(group.items.first().unwrap().subtotal, Money::new(dec!(30.00)));
        assert_eq!(group.total, Money::new(dec!(30.00)));
    }

    #[test]
    fn test_unknown_methods_are_ignored() {
        let names = vec![
            "pix_direct".to_string(),
            "mercadopago".to_string(),
            "whatsapp".to_string(),
        ];
        assert_eq!(
            convert_payment_methods(&names),
            vec![PaymentMethod::Gateway, PaymentMethod::DirectMessage]
        );
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message(r#"{"message":"CEP inválido"}"#), "CEP inválido");
        assert_eq!(error_message(r#"{"detail":"Carrinho vazio"}"#), "Carrinho vazio");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
