//! Shopper cart partitioned by seller.
//!
//! The cart is owned by the external cart service and is eventually
//! consistent. [`CartStore`] never merges quantity changes locally: every
//! mutation is delegated to the service and followed by a full re-fetch.

use std::collections::HashSet;
use std::sync::Arc;

use marketplace_core::{CartItemId, Money, ProductId, StoreId};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{CheckoutError, Result};
use crate::ports::CartService;

/// One line of a seller-group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    /// Always at least 1; a line with zero quantity is removed instead.
    pub quantity: u32,
    /// `unit_price * quantity`.
    pub subtotal: Money,
    /// Units available, when the store tracks stock.
    pub stock_limit: Option<u32>,
}

impl CartItem {
    /// Create a line, computing its subtotal.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `quantity` is zero or exceeds `stock_limit`.
    pub fn new(
        id: CartItemId,
        product_id: ProductId,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
        stock_limit: Option<u32>,
    ) -> Result<Self> {
        let mut item = Self {
            id,
            product_id,
            name: name.into(),
            unit_price,
            quantity: 1,
            subtotal: unit_price,
            stock_limit,
        };
        item.set_quantity(quantity)?;
        Ok(item)
    }

    /// Check that `quantity` is a valid line quantity for this item.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `quantity` is zero or exceeds `stock_limit`.
    pub fn check_quantity(&self, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(CheckoutError::Validation(
                "A quantidade deve ser pelo menos 1".to_string(),
            ));
        }
        if let Some(limit) = self.stock_limit
            && quantity > limit
        {
            return Err(CheckoutError::Validation(format!(
                "Apenas {limit} unidade(s) de {} em estoque",
                self.name
            )));
        }
        Ok(())
    }

    /// Change the quantity and recompute the subtotal.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `quantity` is zero or exceeds `stock_limit`;
    /// the item is left unchanged.
    pub fn set_quantity(&mut self, quantity: u32) -> Result<()> {
        self.check_quantity(quantity)?;
        self.quantity = quantity;
        self.subtotal = self.unit_price.times(quantity);
        Ok(())
    }
}

/// The part of the cart belonging to one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCartGroup {
    pub store_id: StoreId,
    pub store_name: String,
    pub store_whatsapp: Option<String>,
    /// When false, the only way to complete is the direct-message handoff.
    pub checkout_enabled: bool,
    pub items: Vec<CartItem>,
    pub total: Money,
}

impl StoreCartGroup {
    /// Whether the group has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Sum of line subtotals.
    #[must_use]
    pub fn items_total(&self) -> Money {
        self.items.iter().map(|i| i.subtotal).sum()
    }

    /// Find a line by its ID.
    #[must_use]
    pub fn item(&self, item_id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == item_id)
    }
}

/// The shopper's cart, one group per store.
///
/// Groups keep the order the cart service returned them in, and no two
/// groups share a `store_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartAggregate {
    groups: Vec<StoreCartGroup>,
}

impl CartAggregate {
    /// Build an aggregate from groups.
    ///
    /// # Errors
    ///
    /// Returns `Unexpected` if two groups share a store ID.
    pub fn new(groups: Vec<StoreCartGroup>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(groups.len());
        for group in &groups {
            if !seen.insert(group.store_id) {
                return Err(CheckoutError::Unexpected(format!(
                    "cart has more than one group for store {}",
                    group.store_id
                )));
            }
        }
        Ok(Self { groups })
    }

    /// An empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self { groups: Vec::new() }
    }

    /// Whether the cart has no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// All groups, in service order.
    #[must_use]
    pub fn groups(&self) -> &[StoreCartGroup] {
        &self.groups
    }

    /// The group for a store.
    #[must_use]
    pub fn group(&self, store_id: StoreId) -> Option<&StoreCartGroup> {
        self.groups.iter().find(|g| g.store_id == store_id)
    }

    /// Find a line anywhere in the cart.
    #[must_use]
    pub fn find_item(&self, item_id: CartItemId) -> Option<&CartItem> {
        self.groups.iter().find_map(|g| g.item(item_id))
    }

    /// Sum of every group's total.
    #[must_use]
    pub fn total(&self) -> Money {
        self.groups.iter().map(|g| g.total).sum()
    }
}

/// What a quantity change turns into at the cart service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    Update(u32),
    Remove,
}

/// Decide how to apply a new quantity to a line.
///
/// Zero means "remove the line", never "quantity = 0".
///
/// # Errors
///
/// Returns `Validation` if the quantity exceeds the stock limit.
pub fn plan_quantity_change(item: &CartItem, quantity: u32) -> Result<QuantityChange> {
    if quantity == 0 {
        return Ok(QuantityChange::Remove);
    }
    item.check_quantity(quantity)?;
    Ok(QuantityChange::Update(quantity))
}

/// Holds the latest cart snapshot and routes mutations to the cart service.
pub struct CartStore {
    service: Arc<dyn CartService>,
    snapshot: CartAggregate,
}

impl CartStore {
    /// Create a store with an empty snapshot. Call [`CartStore::refresh`] to load.
    #[must_use]
    pub fn new(service: Arc<dyn CartService>) -> Self {
        Self {
            service,
            snapshot: CartAggregate::empty(),
        }
    }

    /// The last fetched cart.
    #[must_use]
    pub const fn snapshot(&self) -> &CartAggregate {
        &self.snapshot
    }

    /// Re-fetch the whole cart.
    ///
    /// # Errors
    ///
    /// Returns the cart service error; the previous snapshot is kept.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> Result<&CartAggregate> {
        self.snapshot = self.service.get_cart().await?;
        debug!(groups = self.snapshot.groups().len(), "Cart refreshed");
        Ok(&self.snapshot)
    }

    /// Set a line's quantity; zero removes it.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the item is unknown or over the stock limit,
    /// or the cart service error.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn set_quantity(
        &mut self,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<&CartAggregate> {
        let item = self.snapshot.find_item(item_id).ok_or_else(|| {
            CheckoutError::Validation("Item não encontrado no carrinho".to_string())
        })?;

        match plan_quantity_change(item, quantity)? {
            QuantityChange::Update(quantity) => {
                self.service.update_item_quantity(item_id, quantity).await?;
            }
            QuantityChange::Remove => self.service.remove_item(item_id).await?,
        }

        self.refresh().await
    }

    /// Add one unit to a line.
    ///
    /// # Errors
    ///
    /// See [`CartStore::set_quantity`].
    pub async fn increment(&mut self, item_id: CartItemId) -> Result<&CartAggregate> {
        let current = self.current_quantity(item_id)?;
        self.set_quantity(item_id, current.saturating_add(1)).await
    }

    /// Remove one unit from a line; the last unit removes the line.
    ///
    /// # Errors
    ///
    /// See [`CartStore::set_quantity`].
    pub async fn decrement(&mut self, item_id: CartItemId) -> Result<&CartAggregate> {
        let current = self.current_quantity(item_id)?;
        self.set_quantity(item_id, current.saturating_sub(1)).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns the cart service error.
    pub async fn remove(&mut self, item_id: CartItemId) -> Result<&CartAggregate> {
        self.service.remove_item(item_id).await?;
        self.refresh().await
    }

    fn current_quantity(&self, item_id: CartItemId) -> Result<u32> {
        self.snapshot
            .find_item(item_id)
            .map(|i| i.quantity)
            .ok_or_else(|| CheckoutError::Validation("Item não encontrado no carrinho".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeCartService, sample_group};
    use rust_decimal_macros::dec;

    fn item(id: i64, price: Money, quantity: u32, stock: Option<u32>) -> CartItem {
        CartItem::new(
            CartItemId::new(id),
            ProductId::new(id * 10),
            format!("Produto {id}"),
            price,
            quantity,
            stock,
        )
        .unwrap()
    }

    fn group(store: i64, items: Vec<CartItem>) -> StoreCartGroup {
        let total = items.iter().map(|i| i.subtotal).sum();
        StoreCartGroup {
            store_id: StoreId::new(store),
            store_name: format!("Loja {store}"),
            store_whatsapp: None,
            checkout_enabled: true,
            items,
            total,
        }
    }

    #[test]
    fn test_subtotal_tracks_quantity() {
        let mut line = item(1, Money::new(dec!(12.50)), 2, None);
        assert_eq!(line.subtotal, Money::new(dec!(25.00)));

        for quantity in [1, 3, 7, 40] {
            line.set_quantity(quantity).unwrap();
            assert_eq!(line.subtotal, line.unit_price.times(line.quantity));
        }
    }

    #[test]
    fn test_set_quantity_respects_stock_limit() {
        let mut line = item(1, Money::new(dec!(5)), 1, Some(3));
        assert!(line.set_quantity(3).is_ok());
        let err = line.set_quantity(4).unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
        // Rejected change leaves the line untouched
        assert_eq!(line.quantity, 3);
        assert_eq!(line.subtotal, Money::new(dec!(15)));
    }

    #[test]
    fn test_new_rejects_zero_quantity() {
        let result = CartItem::new(
            CartItemId::new(1),
            ProductId::new(1),
            "x",
            Money::ZERO,
            0,
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_plan_zero_is_remove() {
        let line = item(1, Money::new(dec!(5)), 1, Some(2));
        assert_eq!(
            plan_quantity_change(&line, 0).unwrap(),
            QuantityChange::Remove
        );
        assert_eq!(
            plan_quantity_change(&line, 2).unwrap(),
            QuantityChange::Update(2)
        );
        assert!(plan_quantity_change(&line, 3).is_err());
    }

    #[test]
    fn test_aggregate_rejects_duplicate_stores() {
        let a = group(1, vec![item(1, Money::new(dec!(1)), 1, None)]);
        let b = group(1, vec![item(2, Money::new(dec!(1)), 1, None)]);
        let err = CartAggregate::new(vec![a, b]).unwrap_err();
        assert!(matches!(err, CheckoutError::Unexpected(_)));
    }

    #[test]
    fn test_aggregate_lookup() {
        let cart = CartAggregate::new(vec![
            group(1, vec![item(1, Money::new(dec!(10)), 1, None)]),
            group(2, vec![item(2, Money::new(dec!(4)), 2, None)]),
        ])
        .unwrap();

        assert!(!cart.is_empty());
        assert_eq!(cart.group(StoreId::new(2)).unwrap().item_count(), 2);
        assert!(cart.group(StoreId::new(3)).is_none());
        assert_eq!(cart.find_item(CartItemId::new(2)).unwrap().quantity, 2);
        assert_eq!(cart.total(), Money::new(dec!(18)));
        assert!(CartAggregate::empty().is_empty());
    }

    #[tokio::test]
    async fn test_store_decrement_last_unit_removes_line() {
        let service = Arc::new(FakeCartService::new(vec![sample_group(StoreId::new(1), true)]));
        let mut store = CartStore::new(service.clone());
        store.refresh().await.unwrap();

        // Second line has a single unit
        let cart = store.decrement(CartItemId::new(102)).await.unwrap();
        assert!(cart.find_item(CartItemId::new(102)).is_none());
        assert_eq!(cart.group(StoreId::new(1)).unwrap().items.len(), 1);

        let cart = store.increment(CartItemId::new(101)).await.unwrap();
        let line = cart.find_item(CartItemId::new(101)).unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.subtotal, Money::new(dec!(149.70)));
        assert_eq!(service.mutation_calls(), 2);
    }

    #[tokio::test]
    async fn test_store_rejects_over_stock_without_calling_service() {
        let service = Arc::new(FakeCartService::new(vec![sample_group(StoreId::new(1), true)]));
        let mut store = CartStore::new(service.clone());
        store.refresh().await.unwrap();

        let err = store.set_quantity(CartItemId::new(101), 11).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
        assert_eq!(service.mutation_calls(), 0);
        assert_eq!(store.snapshot().find_item(CartItemId::new(101)).unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_removing_last_line_empties_cart() {
        let service = Arc::new(FakeCartService::new(vec![sample_group(StoreId::new(1), true)]));
        let mut store = CartStore::new(service);
        store.refresh().await.unwrap();

        store.remove(CartItemId::new(101)).await.unwrap();
        let cart = store.remove(CartItemId::new(102)).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Money::ZERO);
    }
}
