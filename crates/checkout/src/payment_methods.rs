//! Per-store payment method negotiation.
//!
//! Never fails: when the store's methods cannot be fetched, or the store
//! has checkout disabled, the shopper is offered the direct-message handoff
//! only.

use marketplace_core::PaymentMethod;
use tracing::{debug, instrument, warn};

use crate::cart::StoreCartGroup;
use crate::ports::PaymentMethodService;

/// Methods offered for one checkout session, in the store's order.
///
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedMethods(Vec<PaymentMethod>);

impl AcceptedMethods {
    /// The direct-message-only fallback.
    #[must_use]
    pub fn fallback() -> Self {
        Self(vec![PaymentMethod::DirectMessage])
    }

    /// Deduplicate, keeping first occurrence; an empty list falls back.
    #[must_use]
    pub fn from_methods(methods: impl IntoIterator<Item = PaymentMethod>) -> Self {
        let mut unique: Vec<PaymentMethod> = Vec::with_capacity(2);
        for method in methods {
            if !unique.contains(&method) {
                unique.push(method);
            }
        }
        if unique.is_empty() {
            Self::fallback()
        } else {
            Self(unique)
        }
    }

    /// The method selected when the session starts.
    #[must_use]
    pub fn preferred(&self) -> PaymentMethod {
        self.0.first().copied().unwrap_or(PaymentMethod::DirectMessage)
    }

    #[must_use]
    pub fn contains(&self, method: PaymentMethod) -> bool {
        self.0.contains(&method)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[PaymentMethod] {
        &self.0
    }
}

impl Default for AcceptedMethods {
    fn default() -> Self {
        Self::fallback()
    }
}

/// Discover which methods a store accepts for this group.
#[instrument(skip_all, fields(store_id = %group.store_id))]
pub async fn negotiate(
    service: &dyn PaymentMethodService,
    group: &StoreCartGroup,
) -> AcceptedMethods {
    if !group.checkout_enabled {
        debug!("Store checkout disabled, direct message only");
        return AcceptedMethods::fallback();
    }

    match service.accepted_methods(group.store_id).await {
        Ok(methods) => {
            let accepted = AcceptedMethods::from_methods(methods);
            debug!(methods = ?accepted.as_slice(), "Payment methods negotiated");
            accepted
        }
        Err(e) => {
            warn!(error = %e, "Payment methods unavailable, falling back to direct message");
            AcceptedMethods::fallback()
        }
    }
}
