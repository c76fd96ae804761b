//! In-memory fakes of every collaborator port.
//!
//! Enabled in unit tests and, for other crates, with the `testing` feature.
//! Every fake counts its calls so tests can assert on what reached the
//! "network".

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use marketplace_core::{
    AddressId, CartItemId, Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
    StoreId,
};
use url::Url;

use crate::address::{AddressDraft, City, ShippingAddress};
use crate::cart::{CartAggregate, CartItem, StoreCartGroup};
use crate::error::{CheckoutError, Result};
use crate::order::{CheckoutPayload, Order, OrderItem, PaymentInfo, PaymentPreference, ShippingTarget};
use crate::ports::{
    AddressService, CartService, CityService, Navigator, Notice, OrderService,
    PaymentMethodService, Services,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

// =============================================================================
// Fixtures
// =============================================================================

/// A two-line seller-group.
#[must_use]
pub fn sample_group(store_id: StoreId, checkout_enabled: bool) -> StoreCartGroup {
    let base = store_id.as_i64() * 100;
    let items = vec![
        CartItem {
            id: CartItemId::new(base + 1),
            product_id: ProductId::new(base + 1),
            name: "Camiseta Algodão".to_string(),
            unit_price: Money::from_cents(4990),
            quantity: 2,
            subtotal: Money::from_cents(9980),
            stock_limit: Some(10),
        },
        CartItem {
            id: CartItemId::new(base + 2),
            product_id: ProductId::new(base + 2),
            name: "Caneca Esmaltada".to_string(),
            unit_price: Money::from_cents(3500),
            quantity: 1,
            subtotal: Money::from_cents(3500),
            stock_limit: None,
        },
    ];
    StoreCartGroup {
        store_id,
        store_name: format!("Loja {store_id}"),
        store_whatsapp: Some("(11) 98765-4321".to_string()),
        checkout_enabled,
        total: items.iter().map(|i| i.subtotal).sum(),
        items,
    }
}

/// A saved address.
#[must_use]
pub fn sample_address(id: i64, is_default: bool) -> ShippingAddress {
    ShippingAddress {
        id: AddressId::new(id),
        label: Some("Casa".to_string()),
        recipient_name: "Marina Alves".to_string(),
        street: "Av. Paulista".to_string(),
        number: "1578".to_string(),
        complement: None,
        neighborhood: "Bela Vista".to_string(),
        city: "São Paulo".to_string(),
        city_id: None,
        state: "SP".to_string(),
        zip_code: "01310200".to_string(),
        phone: "11987654321".to_string(),
        is_default,
    }
}

/// A small city reference list.
#[must_use]
pub fn sample_cities() -> Vec<City> {
    [(1, "São Paulo", "SP"), (2, "Campinas", "SP"), (3, "Rio de Janeiro", "RJ")]
        .into_iter()
        .map(|(id, name, state)| City {
            id: marketplace_core::CityId::new(id),
            name: name.to_string(),
            state: state.to_string(),
            active: true,
        })
        .collect()
}

/// A gateway order with the given payment status.
#[must_use]
pub fn sample_order(id: i64, payment_status: PaymentStatus) -> Order {
    Order {
        id: OrderId::new(id),
        store_id: StoreId::new(1),
        items: Vec::new(),
        subtotal: Money::from_cents(13480),
        shipping_cost: None,
        total: Money::from_cents(13480),
        status: OrderStatus::Pending,
        payment_status,
        payment_method: Some(PaymentMethod::Gateway),
        payment_info: None,
        shipping_address: None,
        store_whatsapp: None,
        created_at: None,
    }
}

/// Inline PIX instructions.
#[must_use]
pub fn sample_pix() -> PaymentInfo {
    PaymentInfo {
        pix_key: Some("pagamentos@loja.example".to_string()),
        pix_copy_paste_text: Some("00020126580014br.gov.bcb.pix0136".to_string()),
        ..PaymentInfo::default()
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Cart service over a list of groups. Groups left empty are dropped.
#[derive(Debug, Default)]
pub struct FakeCartService {
    groups: Mutex<Vec<StoreCartGroup>>,
    failure: Mutex<Option<CheckoutError>>,
    get_calls: AtomicUsize,
    mutation_calls: AtomicUsize,
}

impl FakeCartService {
    #[must_use]
    pub fn new(groups: Vec<StoreCartGroup>) -> Self {
        Self {
            groups: Mutex::new(groups),
            ..Self::default()
        }
    }

    /// Replace the cart, as another tab would.
    pub fn set_groups(&self, groups: Vec<StoreCartGroup>) {
        *lock(&self.groups) = groups;
    }

    /// Make every call fail with `err` until cleared.
    pub fn fail_with(&self, err: Option<CheckoutError>) {
        *lock(&self.failure) = err;
    }

    pub fn get_cart_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        lock(&self.failure).clone().map_or(Ok(()), Err)
    }

    fn with_item<F>(&self, item_id: CartItemId, f: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<CartItem>, usize) -> Result<()>,
    {
        let mut groups = lock(&self.groups);
        let found = groups.iter().enumerate().find_map(|(g, group)| {
            group
                .items
                .iter()
                .position(|i| i.id == item_id)
                .map(|pos| (g, pos))
        });
        let Some((g, pos)) = found else {
            return Err(CheckoutError::Conflict(format!("item {item_id} not in cart")));
        };

        if let Some(group) = groups.get_mut(g) {
            f(&mut group.items, pos)?;
            group.total = group.items_total();
        }
        groups.retain(|group| !group.is_empty());
        Ok(())
    }
}

#[async_trait]
impl CartService for FakeCartService {
    async fn get_cart(&self) -> Result<CartAggregate> {
        bump(&self.get_calls);
        self.check()?;
        CartAggregate::new(lock(&self.groups).clone())
    }

    async fn update_item_quantity(&self, item_id: CartItemId, quantity: u32) -> Result<()> {
        bump(&self.mutation_calls);
        self.check()?;
        self.with_item(item_id, |items, pos| match items.get_mut(pos) {
            Some(item) => item.set_quantity(quantity),
            None => Ok(()),
        })
    }

    async fn remove_item(&self, item_id: CartItemId) -> Result<()> {
        bump(&self.mutation_calls);
        self.check()?;
        self.with_item(item_id, |items, pos| {
            items.remove(pos);
            Ok(())
        })
    }
}

// =============================================================================
// Addresses and cities
// =============================================================================

/// Address service keeping a single default, like the real one.
#[derive(Debug, Default)]
pub struct FakeAddressService {
    addresses: Mutex<Vec<ShippingAddress>>,
    fail_list: Mutex<Option<CheckoutError>>,
    next_id: AtomicI64,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl FakeAddressService {
    #[must_use]
    pub fn new(addresses: Vec<ShippingAddress>) -> Self {
        let next_id = addresses.iter().map(|a| a.id.as_i64()).max().unwrap_or(0) + 1;
        Self {
            addresses: Mutex::new(addresses),
            next_id: AtomicI64::new(next_id),
            ..Self::default()
        }
    }

    /// Make `list_addresses` fail with `err` until cleared.
    pub fn fail_list(&self, err: Option<CheckoutError>) {
        *lock(&self.fail_list) = err;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn store(&self, address: ShippingAddress) -> ShippingAddress {
        let mut addresses = lock(&self.addresses);
        if address.is_default {
            for existing in addresses.iter_mut() {
                existing.is_default = false;
            }
        }
        match addresses.iter_mut().find(|a| a.id == address.id) {
            Some(existing) => *existing = address.clone(),
            None => addresses.push(address.clone()),
        }
        address
    }
}

fn from_draft(id: AddressId, draft: &AddressDraft) -> ShippingAddress {
    ShippingAddress {
        id,
        label: draft.label.clone(),
        recipient_name: draft.recipient_name.clone(),
        street: draft.street.clone(),
        number: draft.number.clone(),
        complement: draft.complement.clone(),
        neighborhood: draft.neighborhood.clone(),
        city: draft.city.clone(),
        city_id: draft.city_id,
        state: draft.state.clone(),
        zip_code: draft.zip_code.clone(),
        phone: draft.phone.clone(),
        is_default: draft.is_default,
    }
}

#[async_trait]
impl AddressService for FakeAddressService {
    async fn list_addresses(&self) -> Result<Vec<ShippingAddress>> {
        bump(&self.list_calls);
        if let Some(err) = lock(&self.fail_list).clone() {
            return Err(err);
        }
        Ok(lock(&self.addresses).clone())
    }

    async fn create_address(&self, draft: &AddressDraft) -> Result<ShippingAddress> {
        bump(&self.create_calls);
        let id = AddressId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        Ok(self.store(from_draft(id, draft)))
    }

    async fn update_address(&self, id: AddressId, draft: &AddressDraft) -> Result<ShippingAddress> {
        bump(&self.update_calls);
        if !lock(&self.addresses).iter().any(|a| a.id == id) {
            return Err(CheckoutError::Validation("Endereço não encontrado".to_string()));
        }
        Ok(self.store(from_draft(id, draft)))
    }

    async fn set_default_address(&self, id: AddressId) -> Result<()> {
        let mut addresses = lock(&self.addresses);
        if !addresses.iter().any(|a| a.id == id) {
            return Err(CheckoutError::Validation("Endereço não encontrado".to_string()));
        }
        for address in addresses.iter_mut() {
            address.is_default = address.id == id;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeCityService {
    cities: Vec<City>,
    failure: Option<CheckoutError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeCityService {
    #[must_use]
    pub fn new(cities: Vec<City>) -> Self {
        Self {
            cities,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing(err: CheckoutError) -> Self {
        Self {
            failure: Some(err),
            ..Self::default()
        }
    }

    /// Answer only after `delay`, as a slow reference service would.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CityService for FakeCityService {
    async fn list_cities(&self) -> Result<Vec<City>> {
        bump(&self.calls);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.cities.clone()),
        }
    }
}

// =============================================================================
// Payment methods
// =============================================================================

#[derive(Debug, Default)]
pub struct FakePaymentMethodService {
    methods: Vec<PaymentMethod>,
    failure: Option<CheckoutError>,
    calls: AtomicUsize,
}

impl FakePaymentMethodService {
    #[must_use]
    pub fn new(methods: Vec<PaymentMethod>) -> Self {
        Self {
            methods,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing(err: CheckoutError) -> Self {
        Self {
            failure: Some(err),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentMethodService for FakePaymentMethodService {
    async fn accepted_methods(&self, _store_id: StoreId) -> Result<Vec<PaymentMethod>> {
        bump(&self.calls);
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.methods.clone()),
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order service that creates orders from payloads and replays scripted
/// payment statuses on `get_order`.
#[derive(Debug)]
pub struct FakeOrderService {
    orders: Mutex<Vec<Order>>,
    payloads: Mutex<Vec<CheckoutPayload>>,
    create_failure: Mutex<Option<CheckoutError>>,
    inline_pix: Mutex<Option<PaymentInfo>>,
    preference: Mutex<Option<Result<PaymentPreference>>>,
    preference_requests: Mutex<Vec<(OrderId, StoreId)>>,
    statuses: Mutex<VecDeque<Result<PaymentStatus>>>,
    next_id: AtomicI64,
    create_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl Default for FakeOrderService {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeOrderService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(Vec::new()),
            payloads: Mutex::new(Vec::new()),
            create_failure: Mutex::new(None),
            inline_pix: Mutex::new(None),
            preference: Mutex::new(None),
            preference_requests: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::new()),
            next_id: AtomicI64::new(1001),
            create_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    /// Make `create_order` fail with `err` until cleared.
    pub fn fail_create(&self, err: Option<CheckoutError>) {
        *lock(&self.create_failure) = err;
    }

    /// Attach inline PIX instructions to created gateway orders.
    pub fn with_inline_pix(&self, info: Option<PaymentInfo>) {
        *lock(&self.inline_pix) = info;
    }

    /// Override the preference response. The default links to
    /// `https://pay.example/checkout/{order_id}`.
    pub fn set_preference(&self, preference: Option<Result<PaymentPreference>>) {
        *lock(&self.preference) = preference;
    }

    /// Results for successive `get_order` calls; the last one repeats.
    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = Result<PaymentStatus>>) {
        *lock(&self.statuses) = statuses.into_iter().collect();
    }

    /// Add an existing order.
    pub fn insert_order(&self, order: Order) {
        lock(&self.orders).push(order);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn get_order_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn preference_calls(&self) -> usize {
        lock(&self.preference_requests).len()
    }

    pub fn preference_requests(&self) -> Vec<(OrderId, StoreId)> {
        lock(&self.preference_requests).clone()
    }

    /// Every payload `create_order` received.
    pub fn payloads(&self) -> Vec<CheckoutPayload> {
        lock(&self.payloads).clone()
    }

    fn next_status(&self) -> Option<Result<PaymentStatus>> {
        let mut statuses = lock(&self.statuses);
        if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        }
    }
}

#[async_trait]
impl OrderService for FakeOrderService {
    async fn create_order(&self, payload: &CheckoutPayload) -> Result<Order> {
        bump(&self.create_calls);
        lock(&self.payloads).push(payload.clone());
        if let Some(err) = lock(&self.create_failure).clone() {
            return Err(err);
        }

        let id = OrderId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let items: Vec<OrderItem> = payload
            .items
            .iter()
            .map(|item| OrderItem {
                product_id: item.product_id,
                name: format!("Produto {}", item.product_id),
                quantity: item.quantity,
                unit_price: Money::from_cents(1000),
                subtotal: Money::from_cents(1000).times(item.quantity),
            })
            .collect();
        let subtotal: Money = items.iter().map(|i| i.subtotal).sum();
        let payment_info = if payload.payment_method.is_gateway() {
            lock(&self.inline_pix).clone()
        } else {
            None
        };
        let shipping_address = match &payload.shipping {
            ShippingTarget::New(draft) => Some(draft.clone()),
            ShippingTarget::Saved(_) => None,
        };

        let order = Order {
            id,
            store_id: payload.store_id,
            items,
            subtotal,
            shipping_cost: None,
            total: subtotal,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: Some(payload.payment_method),
            payment_info,
            shipping_address,
            store_whatsapp: None,
            created_at: None,
        };
        lock(&self.orders).push(order.clone());
        Ok(order)
    }

    async fn create_payment_preference(
        &self,
        order_id: OrderId,
        store_id: StoreId,
    ) -> Result<PaymentPreference> {
        lock(&self.preference_requests).push((order_id, store_id));
        match lock(&self.preference).clone() {
            Some(result) => result,
            None => Ok(PaymentPreference {
                init_point: Some(format!("https://pay.example/checkout/{order_id}")),
                sandbox_init_point: Some(format!("https://sandbox.pay.example/checkout/{order_id}")),
            }),
        }
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        bump(&self.get_calls);
        let stored = lock(&self.orders).iter().find(|o| o.id == order_id).cloned();
        let mut order = stored.unwrap_or_else(|| sample_order(order_id.as_i64(), PaymentStatus::Pending));
        if let Some(next) = self.next_status() {
            order.payment_status = next?;
        }
        Ok(order)
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(lock(&self.orders).clone())
    }
}

// =============================================================================
// Navigator
// =============================================================================

/// Navigator that records every call.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    navigations: Mutex<Vec<Url>>,
    external: Mutex<Vec<Url>>,
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNavigator {
    pub fn navigations(&self) -> Vec<Url> {
        lock(&self.navigations).clone()
    }

    pub fn external(&self) -> Vec<Url> {
        lock(&self.external).clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &Url) {
        lock(&self.navigations).push(url.clone());
    }

    fn open_external(&self, url: &Url) {
        lock(&self.external).push(url.clone());
    }

    fn notify(&self, notice: Notice) {
        lock(&self.notices).push(notice);
    }
}

// =============================================================================
// Bundle
// =============================================================================

/// One fake per port, with typed handles for assertions.
#[derive(Debug, Clone)]
pub struct FakeServices {
    pub cart: Arc<FakeCartService>,
    pub addresses: Arc<FakeAddressService>,
    pub cities: Arc<FakeCityService>,
    pub payment_methods: Arc<FakePaymentMethodService>,
    pub orders: Arc<FakeOrderService>,
    pub navigator: Arc<RecordingNavigator>,
}

impl FakeServices {
    /// Fakes for a cart with `groups`, the given saved addresses and methods.
    #[must_use]
    pub fn new(
        groups: Vec<StoreCartGroup>,
        addresses: Vec<ShippingAddress>,
        methods: Vec<PaymentMethod>,
    ) -> Self {
        Self {
            cart: Arc::new(FakeCartService::new(groups)),
            addresses: Arc::new(FakeAddressService::new(addresses)),
            cities: Arc::new(FakeCityService::new(sample_cities())),
            payment_methods: Arc::new(FakePaymentMethodService::new(methods)),
            orders: Arc::new(FakeOrderService::new()),
            navigator: Arc::new(RecordingNavigator::default()),
        }
    }

    /// Port handles for the orchestrator.
    #[must_use]
    pub fn services(&self) -> Services {
        Services {
            cart: self.cart.clone(),
            addresses: self.addresses.clone(),
            cities: self.cities.clone(),
            payment_methods: self.payment_methods.clone(),
            orders: self.orders.clone(),
            navigator: self.navigator.clone(),
        }
    }
}
