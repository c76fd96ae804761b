//! Direct-message handoff to the seller.
//!
//! Builds the pre-filled order message and the `wa.me` link that opens it.
//! Opening the link is best-effort; nothing here learns whether it worked.

use std::fmt::Write as _;

use marketplace_core::Money;
use url::Url;

use crate::address::{AddressLines, ResolvedAddress};
use crate::cart::StoreCartGroup;
use crate::order::Order;

const COUNTRY_CODE: &str = "55";

/// A ready-to-send direct message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    /// Plain-text message body.
    pub message: String,
    /// Link that opens the message; `None` when the store has no number.
    pub url: Option<Url>,
}

impl Handoff {
    /// Build the handoff for a created order.
    #[must_use]
    pub fn new(
        order: &Order,
        group: &StoreCartGroup,
        address: &ResolvedAddress,
        notes: Option<&str>,
    ) -> Self {
        let message = order_message(order, group, address, notes);
        let url = order
            .store_whatsapp
            .as_deref()
            .or(group.store_whatsapp.as_deref())
            .and_then(normalize_phone)
            .and_then(|number| message_url(&number, &message));
        Self { message, url }
    }
}

/// Digits-only international number, adding the Brazil country code to
/// 10- and 11-digit national numbers.
#[must_use]
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        0 => None,
        10 | 11 => Some(format!("{COUNTRY_CODE}{digits}")),
        _ => Some(digits),
    }
}

/// `https://wa.me/{number}?text={message}`
#[must_use]
pub fn message_url(number: &str, message: &str) -> Option<Url> {
    Url::parse(&format!(
        "https://wa.me/{number}?text={}",
        urlencoding::encode(message)
    ))
    .ok()
}

/// Format the order as a pt-BR message.
///
/// Lists the order's items, falling back to the cart lines when the order
/// service did not echo them.
#[must_use]
pub fn order_message(
    order: &Order,
    group: &StoreCartGroup,
    address: &ResolvedAddress,
    notes: Option<&str>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Olá! Gostaria de confirmar o pedido #{} na {}:",
        order.id, group.store_name
    );
    out.push('\n');

    if order.items.is_empty() {
        for item in &group.items {
            line_item(&mut out, item.quantity, &item.name, item.subtotal);
        }
    } else {
        for item in &order.items {
            line_item(&mut out, item.quantity, &item.name, item.subtotal);
        }
    }

    out.push('\n');
    let _ = writeln!(out, "Subtotal: {}", order.subtotal.display());
    if let Some(shipping) = order.shipping_cost.filter(|s| !s.is_zero()) {
        let _ = writeln!(out, "Frete: {}", shipping.display());
    }
    let _ = writeln!(out, "Total: {}", order.total.display());

    out.push('\n');
    out.push_str("Endereço de entrega:\n");
    match address {
        ResolvedAddress::Saved(saved) => {
            address_block(&mut out, &saved.recipient_name, &saved.phone, saved);
        }
        ResolvedAddress::New(draft) => {
            address_block(&mut out, &draft.recipient_name, &draft.phone, draft);
        }
    }

    if let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) {
        out.push('\n');
        let _ = writeln!(out, "Observações: {notes}");
    }

    out.trim_end().to_string()
}

fn line_item(out: &mut String, quantity: u32, name: &str, subtotal: Money) {
    let _ = writeln!(out, "• {quantity}x {name} - {}", subtotal.display());
}

fn address_block(out: &mut String, recipient: &str, phone: &str, lines: &dyn AddressLines) {
    if !recipient.trim().is_empty() {
        let _ = writeln!(out, "{}", recipient.trim());
    }
    let _ = writeln!(out, "{}", lines.street_line());
    let _ = writeln!(out, "{}", lines.city_line());
    let _ = writeln!(out, "{}", lines.zip_line());
    if !phone.trim().is_empty() {
        let _ = writeln!(out, "Telefone: {}", phone.trim());
    }
}
