//! Per-shopper context and per-dialog checkout session state.

use std::sync::Arc;

use marketplace_core::PaymentMethod;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::address::{AddressResolver, City, FieldErrors};
use crate::cart::StoreCartGroup;
use crate::order::Order;
use crate::payment_methods::AcceptedMethods;
use crate::ports::CityService;

/// State that outlives a single checkout dialog.
///
/// Created when the shopper's browsing session starts and dropped when it
/// ends. Passed to the orchestrator explicitly; nothing here is global.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    cities: Option<Arc<[City]>>,
}

impl SessionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached city list, if loaded.
    #[must_use]
    pub fn cities(&self) -> Option<&Arc<[City]>> {
        self.cities.as_ref()
    }

    /// Load the city list once per context.
    ///
    /// Failures are logged and yield `None`; the address form then works
    /// with free-text cities.
    pub async fn load_cities(&mut self, service: &dyn CityService) -> Option<Arc<[City]>> {
        if let Some(cities) = &self.cities {
            return Some(Arc::clone(cities));
        }
        match service.list_cities().await {
            Ok(list) => {
                debug!(count = list.len(), "City list loaded");
                let cities: Arc<[City]> = Arc::from(list);
                self.cities = Some(Arc::clone(&cities));
                Some(cities)
            }
            Err(e) => {
                warn!(error = %e, "City list unavailable");
                None
            }
        }
    }
}

/// Ephemeral state of one checkout dialog for one seller-group.
#[derive(Debug)]
pub struct CheckoutSession {
    pub(crate) group: StoreCartGroup,
    pub(crate) address: AddressResolver,
    pub(crate) methods: AcceptedMethods,
    pub(crate) selected_method: Option<PaymentMethod>,
    pub(crate) notes: Option<String>,
    /// Gateway order whose payment preference could not be created.
    pub(crate) pending_order: Option<Order>,
    /// Idempotency key of an order request whose outcome is unknown.
    pub(crate) submission_key: Option<Uuid>,
}

impl CheckoutSession {
    pub(crate) fn new(group: StoreCartGroup) -> Self {
        Self {
            group,
            address: AddressResolver::new(),
            methods: AcceptedMethods::fallback(),
            selected_method: None,
            notes: None,
            pending_order: None,
            submission_key: None,
        }
    }

    /// The seller-group being checked out, as last read from the cart.
    #[must_use]
    pub const fn group(&self) -> &StoreCartGroup {
        &self.group
    }

    #[must_use]
    pub const fn address(&self) -> &AddressResolver {
        &self.address
    }

    #[must_use]
    pub fn available_methods(&self) -> &[PaymentMethod] {
        self.methods.as_slice()
    }

    #[must_use]
    pub const fn selected_method(&self) -> Option<PaymentMethod> {
        self.selected_method
    }

    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// The order awaiting a payment retry, if preference creation failed.
    #[must_use]
    pub const fn pending_order(&self) -> Option<&Order> {
        self.pending_order.as_ref()
    }

    /// Per-field errors of the address being edited.
    #[must_use]
    pub fn validation_errors(&self) -> FieldErrors {
        self.address
            .form()
            .map(|form| form.errors().clone())
            .unwrap_or_default()
    }

    /// The key for the next order request, reusing one left by a request
    /// that may have reached the server.
    pub(crate) fn submission_key(&mut self) -> Uuid {
        *self.submission_key.get_or_insert_with(Uuid::new_v4)
    }

    pub(crate) fn apply_methods(&mut self, methods: AcceptedMethods) {
        self.selected_method = Some(methods.preferred());
        self.methods = methods;
    }

    /// Whether an address and a method are both settled.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.selected_method.is_some() && self.address.resolved().is_some()
    }
}
