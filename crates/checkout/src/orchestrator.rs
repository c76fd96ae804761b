//! Checkout state machine for one seller-group at a time.
//!
//! ```text
//! Idle -> AddressPending <-> MethodReady -> Submitting -> HandoffReady
//!                                                      -> PaymentPending
//!                                                      -> Failed
//! ```
//!
//! - `begin` fetches payment methods and saved addresses concurrently; a
//!   failure in one never aborts the other. The city list is only needed to
//!   link addresses to reference cities, so it is loaded afterwards by
//!   `load_cities` and completes any pending pre-fill when it arrives.
//! - `submit` validates locally first, re-reads the cart, then creates the
//!   order. Gateway orders either start the [`PaymentWatch`] (inline PIX) or
//!   request a payment preference and navigate away. Direct-message orders
//!   open the seller's chat.
//! - A failed preference keeps the created order on the session; the next
//!   `submit` retries the preference for that same order and never creates
//!   a second one.
//! - `close` is valid in every state and discards the session and any
//!   running watch, never the cart.

use std::sync::Arc;

use marketplace_core::{AddressId, CityId, OrderId, PaymentMethod, StoreId};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::address::city::find_city;
use crate::address::{AddressField, ResolvedAddress, ShippingAddress};
use crate::cart::StoreCartGroup;
use crate::config::FlowSettings;
use crate::error::{CheckoutError, ErrorKind, Result, add_breadcrumb, report};
use crate::handoff::Handoff;
use crate::order::{CheckoutPayload, Order};
use crate::payment_methods::negotiate;
use crate::ports::{Notice, Services};
use crate::session::{CheckoutSession, SessionContext};
use crate::watcher::PaymentWatch;

/// Where the checkout dialog is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutState {
    /// No seller-group selected.
    Idle,
    /// Waiting for a resolved address (or a payment method).
    AddressPending,
    /// Address and payment method settled; ready to submit.
    MethodReady,
    /// Submission in flight.
    Submitting,
    /// Direct-message order created and the chat link opened.
    HandoffReady {
        order_id: OrderId,
        /// `None` when the store has no direct-message number.
        url: Option<Url>,
    },
    /// Gateway order created; payment happens elsewhere.
    PaymentPending {
        order_id: OrderId,
        /// Hosted checkout the shopper was sent to. `None` while inline
        /// payment is being watched.
        redirect: Option<Url>,
    },
    /// Submission failed; session data is intact for a retry.
    Failed { kind: ErrorKind, message: String },
}

impl CheckoutState {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AddressPending => "address_pending",
            Self::MethodReady => "method_ready",
            Self::Submitting => "submitting",
            Self::HandoffReady { .. } => "handoff_ready",
            Self::PaymentPending { .. } => "payment_pending",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether session data may still be edited.
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        matches!(
            self,
            Self::AddressPending | Self::MethodReady | Self::Failed { .. }
        )
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Direct-message order; the chat link was opened if the store has one.
    Handoff { order: Order, handoff: Handoff },
    /// Gateway order; the shopper was sent to the hosted checkout.
    Redirect { order_id: OrderId, url: Url },
    /// Gateway order with inline PIX; the payment watch is running.
    AwaitingPayment { order: Order },
}

/// Owned snapshot of what a submission needs.
struct Submission {
    store_id: StoreId,
    address: ResolvedAddress,
    method: PaymentMethod,
    notes: Option<String>,
    pending_order: Option<Order>,
}

/// Drives one checkout dialog.
pub struct CheckoutOrchestrator {
    services: Services,
    settings: FlowSettings,
    context: SessionContext,
    state: CheckoutState,
    session: Option<CheckoutSession>,
    watch: Option<PaymentWatch>,
}

impl CheckoutOrchestrator {
    #[must_use]
    pub const fn new(services: Services, settings: FlowSettings, context: SessionContext) -> Self {
        Self {
            services,
            settings,
            context,
            state: CheckoutState::Idle,
            session: None,
            watch: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &CheckoutState {
        &self.state
    }

    #[must_use]
    pub const fn session(&self) -> Option<&CheckoutSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub const fn context(&self) -> &SessionContext {
        &self.context
    }

    /// The running payment watch, if any.
    #[must_use]
    pub const fn payment_watch(&self) -> Option<&PaymentWatch> {
        self.watch.as_ref()
    }

    fn transition(&mut self, next: CheckoutState) {
        if self.state == next {
            return;
        }
        debug!(from = self.state.name(), to = next.name(), "Checkout transition");
        add_breadcrumb(
            "checkout",
            &format!("{} -> {}", self.state.name(), next.name()),
            &[],
        );
        self.state = next;
    }

    /// Recompute `AddressPending` / `MethodReady` after an edit.
    fn refresh_readiness(&mut self) {
        if !self.state.is_editable() {
            return;
        }
        let Some(ready) = self.session.as_ref().map(CheckoutSession::is_ready) else {
            return;
        };
        self.transition(if ready {
            CheckoutState::MethodReady
        } else {
            CheckoutState::AddressPending
        });
    }

    fn editable_session(&mut self, action: &'static str) -> Result<&mut CheckoutSession> {
        let state = self.state.name();
        if !self.state.is_editable() {
            return Err(CheckoutError::InvalidState { action, state });
        }
        self.session
            .as_mut()
            .ok_or(CheckoutError::InvalidState { action, state })
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Open checkout for a seller-group.
    ///
    /// Any previous session is closed first. Returns once payment methods
    /// and saved addresses are in; follow with [`Self::load_cities`].
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the group has no items.
    #[instrument(skip(self, group), fields(store_id = %group.store_id))]
    pub async fn begin(&mut self, group: StoreCartGroup) -> Result<()> {
        if group.is_empty() {
            return Err(CheckoutError::Validation(
                "Não há itens desta loja no carrinho".to_string(),
            ));
        }
        self.close();

        let mut session = CheckoutSession::new(group);
        self.transition(CheckoutState::AddressPending);
        load_session(&self.services, &self.context, &mut session).await;
        add_breadcrumb(
            "checkout",
            "Checkout opened",
            &[("store_id", session.group.store_id.to_string())],
        );

        self.session = Some(session);
        self.refresh_readiness();
        Ok(())
    }

    /// Close the dialog from any state.
    ///
    /// Stops the payment watch and discards the session; the cart and the
    /// session context are kept.
    pub fn close(&mut self) {
        if let Some(watch) = self.watch.take() {
            watch.cancel();
        }
        if let Some(session) = self.session.take() {
            debug!(store_id = %session.group.store_id, "Checkout closed");
        }
        self.transition(CheckoutState::Idle);
    }

    // =========================================================================
    // Address
    // =========================================================================

    /// Ship to a saved address.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an unknown address, `InvalidState` outside
    /// an editable state.
    pub fn select_address(&mut self, id: AddressId) -> Result<()> {
        self.editable_session("select address")?.address.select(id)?;
        self.refresh_readiness();
        Ok(())
    }

    /// Start entering a new address.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` outside an editable state.
    pub fn open_address_form(&mut self) -> Result<()> {
        self.editable_session("open address form")?
            .address
            .open_new_form();
        self.refresh_readiness();
        Ok(())
    }

    /// Start editing a saved address.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an unknown address, `InvalidState` outside
    /// an editable state.
    pub fn edit_address(&mut self, id: AddressId) -> Result<()> {
        self.editable_session("edit address")?
            .address
            .open_edit_form(id)?;
        self.refresh_readiness();
        Ok(())
    }

    /// Go back to the selected saved address, if there is one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` outside an editable state.
    pub fn close_address_form(&mut self) -> Result<()> {
        self.editable_session("close address form")?
            .address
            .close_form();
        self.refresh_readiness();
        Ok(())
    }

    /// Set one field of the address being edited.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if no address form is open.
    pub fn set_address_field(&mut self, field: AddressField, value: impl Into<String>) -> Result<()> {
        self.editable_session("edit address")?
            .address
            .form_mut()
            .ok_or_else(no_form)?
            .set_field(field, value);
        self.refresh_readiness();
        Ok(())
    }

    /// Mark the address being edited as the shopper's default.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if no address form is open.
    pub fn set_address_default(&mut self, is_default: bool) -> Result<()> {
        self.editable_session("edit address")?
            .address
            .form_mut()
            .ok_or_else(no_form)?
            .set_default(is_default);
        self.refresh_readiness();
        Ok(())
    }

    /// Pick a city from the reference list for the address being edited.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the city is unknown or no form is open.
    pub fn select_city(&mut self, city_id: CityId) -> Result<()> {
        let city = self
            .context
            .cities()
            .and_then(|cities| find_city(cities, city_id))
            .cloned()
            .ok_or_else(|| CheckoutError::Validation("Cidade não encontrada".to_string()))?;
        self.editable_session("select city")?
            .address
            .form_mut()
            .ok_or_else(no_form)?
            .select_city(&city);
        self.refresh_readiness();
        Ok(())
    }

    /// Validate the address being edited without saving it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFields` with every failing field.
    pub fn confirm_address(&mut self) -> Result<()> {
        let result = self.editable_session("confirm address")?.address.confirm_form();
        self.refresh_readiness();
        result
    }

    /// Validate and persist the address being edited, then ship to it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFields` without calling the address service when
    /// validation fails, otherwise the service error.
    #[instrument(skip(self))]
    pub async fn save_address(&mut self) -> Result<ShippingAddress> {
        let service = Arc::clone(&self.services.addresses);
        let saved = self
            .editable_session("save address")?
            .address
            .save_form(service.as_ref())
            .await
            .cloned();
        self.refresh_readiness();
        saved
    }

    /// Make a saved address the shopper's default.
    ///
    /// # Errors
    ///
    /// Returns the address service error.
    #[instrument(skip(self))]
    pub async fn set_default_address(&mut self, id: AddressId) -> Result<()> {
        let service = Arc::clone(&self.services.addresses);
        self.editable_session("set default address")?
            .address
            .set_default(service.as_ref(), id)
            .await
    }

    /// Load the city list and re-link addresses still waiting for it.
    ///
    /// The list is cached on the session context, so only the first call
    /// per context reaches the city service. A failure leaves free-text
    /// cities in place and may be retried.
    #[instrument(skip(self))]
    pub async fn load_cities(&mut self) {
        let cities = self.context.load_cities(self.services.cities.as_ref()).await;
        if let (Some(cities), Some(session)) = (cities, self.session.as_mut()) {
            session.address.apply_cities(cities);
        }
    }

    // =========================================================================
    // Payment method and notes
    // =========================================================================

    /// Choose how to pay.
    ///
    /// Leaving the gateway drops a pending gateway order from the session;
    /// that order stays payable from its detail page.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the store does not accept `method`.
    pub fn select_payment_method(&mut self, method: PaymentMethod) -> Result<()> {
        let session = self.editable_session("select payment method")?;
        if !session.methods.contains(method) {
            return Err(CheckoutError::Validation(
                "Forma de pagamento indisponível para esta loja".to_string(),
            ));
        }
        if !method.is_gateway()
            && let Some(order) = session.pending_order.take()
        {
            info!(order_id = %order.id, "Leaving gateway payment; pending order kept on the account");
        }
        session.selected_method = Some(method);
        self.refresh_readiness();
        Ok(())
    }

    /// Set the free-text notes for the seller.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` outside an editable state.
    pub fn set_notes(&mut self, notes: Option<String>) -> Result<()> {
        self.editable_session("set notes")?.notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        Ok(())
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit the order for the current seller-group.
    ///
    /// # Errors
    ///
    /// - `InvalidFields` when the address fails local validation; nothing is
    ///   sent and the state stays `AddressPending`.
    /// - `Conflict` when the group is gone from the cart; the state returns
    ///   to `MethodReady`.
    /// - `Provider` when the order exists but payment could not be set up.
    /// - Any order service error, with the state moving to `Failed`.
    #[instrument(skip(self), fields(store_id))]
    pub async fn submit(&mut self) -> Result<SubmitOutcome> {
        let submission = match self.prepare_submission() {
            Ok(submission) => submission,
            Err(e) => {
                report(&e);
                return Err(e);
            }
        };
        tracing::Span::current().record("store_id", tracing::field::display(submission.store_id));

        self.transition(CheckoutState::Submitting);
        let result = match submission.pending_order.clone() {
            Some(order) => {
                debug!(order_id = %order.id, "Retrying payment preference for existing order");
                self.request_preference(order).await
            }
            None => self.create_and_dispatch(&submission).await,
        };

        result.map_err(|e| self.fail(e))
    }

    /// Validate locally and snapshot the session for submission.
    fn prepare_submission(&mut self) -> Result<Submission> {
        let session = self.editable_session("submit")?;

        let form_unconfirmed = session
            .address
            .form()
            .is_some_and(|form| form.confirmed().is_none());
        if form_unconfirmed && let Err(e) = session.address.confirm_form() {
            self.refresh_readiness();
            return Err(e);
        }

        let address = session.address.resolved().ok_or_else(|| {
            CheckoutError::Validation("Informe um endereço de entrega".to_string())
        })?;
        let method = session.selected_method.ok_or_else(|| {
            CheckoutError::Validation("Escolha uma forma de pagamento".to_string())
        })?;

        let submission = Submission {
            store_id: session.group.store_id,
            address,
            method,
            notes: session.notes.clone(),
            pending_order: session.pending_order.clone().filter(|_| method.is_gateway()),
        };
        self.refresh_readiness();
        Ok(submission)
    }

    async fn create_and_dispatch(&mut self, submission: &Submission) -> Result<SubmitOutcome> {
        // The cart is shared with other tabs; never trust the session copy.
        let cart = self.services.cart.get_cart().await?;
        let group = cart
            .group(submission.store_id)
            .filter(|group| !group.is_empty())
            .cloned()
            .ok_or_else(|| {
                CheckoutError::Conflict(format!(
                    "store {} no longer has items in the cart",
                    submission.store_id
                ))
            })?;
        if let Some(session) = self.session.as_mut() {
            session.group = group.clone();
        }

        let key = self
            .session
            .as_mut()
            .map_or_else(Uuid::new_v4, CheckoutSession::submission_key);
        let payload = CheckoutPayload::new(
            &group,
            &submission.address,
            submission.method,
            submission.notes.as_deref(),
        )
        .with_idempotency_key(key);
        let created = self.services.orders.create_order(&payload).await;

        // Keep the key only while the server may have stored the order.
        let outcome_unknown = created
            .as_ref()
            .is_err_and(|e| matches!(e.kind(), ErrorKind::Network | ErrorKind::Unexpected));
        if !outcome_unknown && let Some(session) = self.session.as_mut() {
            session.submission_key = None;
        }
        let order = created?;
        info!(order_id = %order.id, method = %submission.method, "Order created");
        add_breadcrumb(
            "checkout",
            "Order created",
            &[("order_id", order.id.to_string())],
        );

        match submission.method {
            PaymentMethod::DirectMessage => Ok(self.hand_off(order, &group, submission)),
            PaymentMethod::Gateway if order.inline_payment().is_some() => {
                Ok(self.start_watch(order))
            }
            PaymentMethod::Gateway => self.request_preference(order).await,
        }
    }

    fn hand_off(
        &mut self,
        order: Order,
        group: &StoreCartGroup,
        submission: &Submission,
    ) -> SubmitOutcome {
        let handoff = Handoff::new(
            &order,
            group,
            &submission.address,
            submission.notes.as_deref(),
        );
        match &handoff.url {
            Some(url) => self.services.navigator.open_external(url),
            None => warn!(store_id = %group.store_id, "Store has no direct-message number"),
        }
        self.transition(CheckoutState::HandoffReady {
            order_id: order.id,
            url: handoff.url.clone(),
        });
        SubmitOutcome::Handoff { order, handoff }
    }

    fn start_watch(&mut self, order: Order) -> SubmitOutcome {
        let watch = PaymentWatch::spawn(
            Arc::clone(&self.services.orders),
            Arc::clone(&self.services.navigator),
            order.clone(),
            self.settings.order_detail_url(order.id),
            self.settings.watch.clone(),
        );
        self.watch = Some(watch);
        self.transition(CheckoutState::PaymentPending {
            order_id: order.id,
            redirect: None,
        });
        SubmitOutcome::AwaitingPayment { order }
    }

    /// Request a hosted payment for an order that is known to exist.
    async fn request_preference(&mut self, order: Order) -> Result<SubmitOutcome> {
        let order_id = order.id;
        let url = match self
            .services
            .orders
            .create_payment_preference(order_id, order.store_id)
            .await
        {
            Ok(preference) => preference
                .redirect_url(self.settings.use_sandbox)
                .ok_or_else(|| CheckoutError::Provider {
                    order_id,
                    message: "payment preference has no checkout link".to_string(),
                }),
            Err(e @ CheckoutError::Provider { .. }) => Err(e),
            Err(e) => Err(CheckoutError::Provider {
                order_id,
                message: e.to_string(),
            }),
        };

        match url {
            Ok(url) => {
                if let Some(session) = self.session.as_mut() {
                    session.pending_order = None;
                }
                self.services.navigator.navigate(&url);
                self.transition(CheckoutState::PaymentPending {
                    order_id,
                    redirect: Some(url.clone()),
                });
                Ok(SubmitOutcome::Redirect { order_id, url })
            }
            Err(e) => {
                if let Some(session) = self.session.as_mut() {
                    session.pending_order = Some(order);
                }
                Err(e)
            }
        }
    }

    /// Record a submission failure and pick the resulting state.
    fn fail(&mut self, err: CheckoutError) -> CheckoutError {
        report(&err);
        let message = err.user_message();
        if err.kind() == ErrorKind::Conflict {
            self.services.navigator.notify(Notice::Error { message });
            self.transition(CheckoutState::MethodReady);
        } else {
            self.transition(CheckoutState::Failed {
                kind: err.kind(),
                message,
            });
        }
        err
    }
}

impl std::fmt::Debug for CheckoutOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutOrchestrator")
            .field("state", &self.state)
            .field("session", &self.session)
            .field("watch", &self.watch)
            .finish_non_exhaustive()
    }
}

fn no_form() -> CheckoutError {
    CheckoutError::Validation("Nenhum endereço em edição".to_string())
}

/// Fetch payment methods and saved addresses concurrently.
async fn load_session(
    services: &Services,
    context: &SessionContext,
    session: &mut CheckoutSession,
) {
    if let Some(cities) = context.cities() {
        session.address.apply_cities(Arc::clone(cities));
    }

    let group = session.group.clone();
    let (accepted, listed) = tokio::join!(
        negotiate(services.payment_methods.as_ref(), &group),
        services.addresses.list_addresses(),
    );

    session.apply_methods(accepted);
    match listed {
        Ok(list) => session.address.apply_addresses(list),
        Err(e) => {
            warn!(error = %e, "Saved addresses unavailable");
            session.address.address_load_failed();
        }
    }
}
