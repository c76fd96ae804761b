//! Status enums for orders and payments.
//!
//! Both statuses are owned by the external order service. The checkout only
//! reads them, so unknown values deserialize into `Unknown` instead of
//! failing the whole order payload.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// Payment status of an order, as reported by the payment provider.
///
/// The provider reports settlement as either `approved` (gateway webhook) or
/// `paid` (manual confirmation by the seller); both count as settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    InProcess,
    Approved,
    Paid,
    Rejected,
    Cancelled,
    Refunded,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Whether the payment reached a final paid state.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Approved | Self::Paid)
    }

    /// Whether the payment can no longer settle.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Refunded)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProcess => "in_process",
            Self::Approved => "approved",
            Self::Paid => "paid",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_statuses() {
        assert!(PaymentStatus::Paid.is_settled());
        assert!(PaymentStatus::Approved.is_settled());
        assert!(!PaymentStatus::Pending.is_settled());
        assert!(!PaymentStatus::InProcess.is_settled());
        assert!(!PaymentStatus::Unknown.is_settled());
    }

    #[test]
    fn test_failed_statuses() {
        assert!(PaymentStatus::Rejected.is_failed());
        assert!(!PaymentStatus::Paid.is_failed());
    }

    #[test]
    fn test_unknown_status_does_not_fail() {
        let status: PaymentStatus = serde_json::from_str("\"chargeback\"").unwrap();
        assert_eq!(status, PaymentStatus::Unknown);

        let status: OrderStatus = serde_json::from_str("\"on_hold\"").unwrap();
        assert_eq!(status, OrderStatus::Unknown);
    }

    #[test]
    fn test_status_roundtrip_names() {
        let status: PaymentStatus = serde_json::from_str("\"in_process\"").unwrap();
        assert_eq!(status, PaymentStatus::InProcess);
        assert_eq!(status.to_string(), "in_process");
    }
}
