//! Payment channels a store can accept at checkout.

use serde::{Deserialize, Serialize};

/// How a shopper completes a purchase with one store.
///
/// The wire names are the ones the marketplace API uses (`whatsapp`,
/// `mercadopago`); the generic names are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Hand the order off to the seller through a pre-filled direct message.
    /// No payment is processed by the platform.
    #[serde(rename = "whatsapp", alias = "direct_message")]
    DirectMessage,
    /// Pay through the hosted payment gateway.
    #[serde(rename = "mercadopago", alias = "gateway")]
    Gateway,
}

impl PaymentMethod {
    /// Parse a method name as returned by the payment-methods endpoint.
    ///
    /// Unknown names return `None` so callers can skip channels they do not
    /// support yet.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "whatsapp" | "direct_message" => Some(Self::DirectMessage),
            "mercadopago" | "mercado_pago" | "gateway" => Some(Self::Gateway),
            _ => None,
        }
    }

    /// The name sent to the order service.
    #[must_use]
    pub const fn as_wire(&self) -> &'static str {
        match self {
            Self::DirectMessage => "whatsapp",
            Self::Gateway => "mercadopago",
        }
    }

    /// Whether this method goes through the hosted payment gateway.
    #[must_use]
    pub const fn is_gateway(&self) -> bool {
        matches!(self, Self::Gateway)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wire() {
        assert_eq!(
            PaymentMethod::from_wire("whatsapp"),
            Some(PaymentMethod::DirectMessage)
        );
        assert_eq!(
            PaymentMethod::from_wire("MercadoPago"),
            Some(PaymentMethod::Gateway)
        );
        assert_eq!(
            PaymentMethod::from_wire("gateway"),
            Some(PaymentMethod::Gateway)
        );
        assert_eq!(PaymentMethod::from_wire("boleto"), None);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Gateway).unwrap(),
            "\"mercadopago\""
        );
        let parsed: PaymentMethod = serde_json::from_str("\"direct_message\"").unwrap();
        assert_eq!(parsed, PaymentMethod::DirectMessage);
    }
}
