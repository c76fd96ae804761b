//! Resolve which address a checkout ships to.
//!
//! Entering checkout pre-selects the default saved address, else the first
//! one, else opens an empty form. No checkout proceeds without either a
//! selected saved address or a confirmed draft.

use std::sync::Arc;

use marketplace_core::AddressId;
use tracing::{debug, instrument};

use super::city::{City, resolve_city};
use super::form::{AddressForm, FieldErrors};
use super::{AddressDraft, ShippingAddress};
use crate::error::{CheckoutError, Result};
use crate::ports::AddressService;

/// The address an order will be shipped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAddress {
    /// A saved address, referenced by ID.
    Saved(ShippingAddress),
    /// A validated draft that has not been saved.
    New(AddressDraft),
}

/// Pick the address to pre-select: the default, else the first.
#[must_use]
pub fn preselect(addresses: &[ShippingAddress]) -> Option<&ShippingAddress> {
    addresses
        .iter()
        .find(|a| a.is_default)
        .or_else(|| addresses.first())
}

/// Address slice of a checkout session.
#[derive(Debug, Default)]
pub struct AddressResolver {
    addresses: Vec<ShippingAddress>,
    selected: Option<AddressId>,
    form: Option<AddressForm>,
    cities: Option<Arc<[City]>>,
    prefill_pending: bool,
}

impl AddressResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved addresses, in service order.
    #[must_use]
    pub fn addresses(&self) -> &[ShippingAddress] {
        &self.addresses
    }

    #[must_use]
    pub fn selected(&self) -> Option<&ShippingAddress> {
        let id = self.selected?;
        self.addresses.iter().find(|a| a.id == id)
    }

    #[must_use]
    pub const fn form(&self) -> Option<&AddressForm> {
        self.form.as_ref()
    }

    pub const fn form_mut(&mut self) -> Option<&mut AddressForm> {
        self.form.as_mut()
    }

    /// Whether saved addresses still wait for the city list to link cities.
    #[must_use]
    pub const fn prefill_pending(&self) -> bool {
        self.prefill_pending
    }

    fn cities(&self) -> &[City] {
        self.cities.as_deref().unwrap_or_default()
    }

    /// Install the shopper's saved addresses and apply the selection policy.
    pub fn apply_addresses(&mut self, addresses: Vec<ShippingAddress>) {
        self.selected = preselect(&addresses).map(|a| a.id);
        self.addresses = addresses;

        if self.selected.is_none() {
            self.form.get_or_insert_with(AddressForm::new);
        } else {
            self.form = None;
        }

        self.prefill();
        debug!(
            count = self.addresses.len(),
            selected = ?self.selected,
            "Addresses applied"
        );
    }

    /// The address list could not be loaded: fall back to the form.
    pub fn address_load_failed(&mut self) {
        if self.addresses.is_empty() {
            self.form.get_or_insert_with(AddressForm::new);
        }
    }

    /// Install the city reference list, re-running any pending pre-fill.
    pub fn apply_cities(&mut self, cities: Arc<[City]>) {
        self.cities = Some(cities);
        if self.prefill_pending {
            self.prefill();
        }
    }

    /// Link saved addresses and the open form to reference cities.
    fn prefill(&mut self) {
        let Some(cities) = self.cities.clone() else {
            self.prefill_pending = !self.addresses.is_empty() || self.form.is_some();
            return;
        };

        for address in self.addresses.iter_mut().filter(|a| a.city_id.is_none()) {
            address.city_id = resolve_city(&cities, &address.city, &address.state).map(|c| c.id);
        }
        if let Some(form) = self.form.as_mut() {
            form.resolve_city(&cities);
        }
        self.prefill_pending = false;
    }

    /// Select a saved address, closing any open form.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the address is not in the list.
    pub fn select(&mut self, id: AddressId) -> Result<()> {
        if !self.addresses.iter().any(|a| a.id == id) {
            return Err(CheckoutError::Validation(
                "Endereço não encontrado".to_string(),
            ));
        }
        self.selected = Some(id);
        self.form = None;
        Ok(())
    }

    /// Open an empty form for a new address.
    pub fn open_new_form(&mut self) -> &mut AddressForm {
        self.form.insert(AddressForm::new())
    }

    /// Open a form pre-filled from a saved address.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the address is not in the list.
    pub fn open_edit_form(&mut self, id: AddressId) -> Result<&mut AddressForm> {
        let address = self
            .addresses
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| CheckoutError::Validation("Endereço não encontrado".to_string()))?;
        let form = AddressForm::edit(id, AddressDraft::from(address));
        Ok(self.form.insert(form))
    }

    /// Close the form and go back to the selected saved address.
    ///
    /// Without saved addresses the form stays open.
    pub fn close_form(&mut self) {
        if self.selected.is_some() {
            self.form = None;
        }
    }

    /// Validate the open form.
    ///
    /// # Errors
    ///
    /// Returns the failing fields, or `Validation` if no form is open.
    pub fn confirm_form(&mut self) -> Result<()> {
        let cities = self.cities.clone();
        let form = self.form.as_mut().ok_or_else(|| {
            CheckoutError::Validation("Nenhum endereço em edição".to_string())
        })?;
        form.confirm(cities.as_deref().unwrap_or_default())
            .map(|_| ())
            .map_err(CheckoutError::InvalidFields)
    }

    /// The address a submission would use right now.
    ///
    /// An open form wins over the selected address, and only counts once
    /// confirmed.
    #[must_use]
    pub fn resolved(&self) -> Option<ResolvedAddress> {
        match &self.form {
            Some(form) => form.confirmed().cloned().map(ResolvedAddress::New),
            None => self.selected().cloned().map(ResolvedAddress::Saved),
        }
    }

    /// Validate the form and persist it, creating or updating.
    ///
    /// The saved address becomes the selection and the form closes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFields` without calling the service when validation
    /// fails, otherwise the address service error.
    #[instrument(skip(self, service))]
    pub async fn save_form(&mut self, service: &dyn AddressService) -> Result<&ShippingAddress> {
        self.confirm_form()?;
        let (editing, draft) = match &self.form {
            Some(form) => (form.editing(), form.confirmed().cloned()),
            None => (None, None),
        };
        let draft = draft.ok_or_else(|| {
            CheckoutError::InvalidFields(self.form_errors())
        })?;

        let saved = match editing {
            Some(id) => service.update_address(id, &draft).await?,
            None => service.create_address(&draft).await?,
        };
        debug!(address_id = %saved.id, "Address saved");

        let id = saved.id;
        self.upsert(saved);
        self.selected = Some(id);
        self.form = None;
        self.selected()
            .ok_or_else(|| CheckoutError::Unexpected("saved address missing".to_string()))
    }

    /// Make a saved address the shopper's default.
    ///
    /// # Errors
    ///
    /// Returns the address service error; local flags are untouched then.
    #[instrument(skip(self, service))]
    pub async fn set_default(&mut self, service: &dyn AddressService, id: AddressId) -> Result<()> {
        service.set_default_address(id).await?;
        for address in &mut self.addresses {
            address.is_default = address.id == id;
        }
        Ok(())
    }

    fn form_errors(&self) -> FieldErrors {
        self.form.as_ref().map(|f| f.errors().clone()).unwrap_or_default()
    }

    fn upsert(&mut self, mut saved: ShippingAddress) {
        if saved.city_id.is_none() {
            saved.city_id =
                resolve_city(self.cities(), &saved.city, &saved.state).map(|c| c.id);
        }
        // The service keeps a single default; mirror it locally.
        if saved.is_default {
            for address in &mut self.addresses {
                address.is_default = false;
            }
        }
        match self.addresses.iter_mut().find(|a| a.id == saved.id) {
            Some(existing) => *existing = saved,
            None => self.addresses.push(saved),
        }
    }
}
