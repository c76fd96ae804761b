//! Address draft editing and local validation.
//!
//! Validation runs entirely client-side and never reaches the network.
//! Errors are sticky: each field's message clears only when that field's
//! value changes, not when another field is edited.

use std::collections::BTreeMap;
use std::fmt;

use marketplace_core::{AddressId, ZipCode, ZipCodeError};
use serde::{Deserialize, Serialize};

use super::AddressDraft;
use super::city::{City, find_city};

/// Editable address fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressField {
    Label,
    RecipientName,
    Street,
    Number,
    Complement,
    Neighborhood,
    City,
    State,
    ZipCode,
    Phone,
}

impl AddressField {
    /// Wire/field name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::RecipientName => "recipient_name",
            Self::Street => "street",
            Self::Number => "number",
            Self::Complement => "complement",
            Self::Neighborhood => "neighborhood",
            Self::City => "city",
            Self::State => "state",
            Self::ZipCode => "zip_code",
            Self::Phone => "phone",
        }
    }
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field → message map of validation failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<AddressField, String>);

impl FieldErrors {
    pub fn insert(&mut self, field: AddressField, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn remove(&mut self, field: AddressField) -> Option<String> {
        self.0.remove(&field)
    }

    #[must_use]
    pub fn get(&self, field: AddressField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, field: AddressField) -> bool {
        self.0.contains_key(&field)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AddressField, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, message)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
        }
        Ok(())
    }
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Validate a draft against the local rules.
///
/// On success returns a normalized copy: trimmed text, digits-only zip code
/// and upper-case state. `cities` may be empty when the reference list has
/// not loaded; the city/state cross-check is skipped in that case.
///
/// # Errors
///
/// Returns every failing field with its pt-BR message.
pub fn validate(draft: &AddressDraft, cities: &[City]) -> Result<AddressDraft, FieldErrors> {
    let mut errors = FieldErrors::default();

    if blank(&draft.street) {
        errors.insert(AddressField::Street, "Rua é obrigatória");
    }
    if blank(&draft.state) {
        errors.insert(AddressField::State, "Estado é obrigatório");
    }
    if blank(&draft.city) {
        errors.insert(AddressField::City, "Cidade é obrigatória");
    } else if let Some(city) = draft.city_id.and_then(|id| find_city(cities, id))
        && !blank(&draft.state)
        && !city.state.trim().eq_ignore_ascii_case(draft.state.trim())
    {
        errors.insert(
            AddressField::City,
            "Cidade não pertence ao estado selecionado",
        );
    }
    if blank(&draft.phone) {
        errors.insert(AddressField::Phone, "Telefone é obrigatório");
    }

    let zip = match ZipCode::parse(&draft.zip_code) {
        Ok(zip) => Some(zip),
        Err(ZipCodeError::Empty | ZipCodeError::WrongLength { .. }) => {
            errors.insert(AddressField::ZipCode, "CEP deve ter 8 dígitos");
            None
        }
    };

    match zip {
        Some(zip) if errors.is_empty() => Ok(AddressDraft {
            label: draft
                .label
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
            recipient_name: draft.recipient_name.trim().to_string(),
            street: draft.street.trim().to_string(),
            number: draft.number.trim().to_string(),
            complement: draft
                .complement
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            neighborhood: draft.neighborhood.trim().to_string(),
            city: draft.city.trim().to_string(),
            city_id: draft.city_id,
            state: draft.state.trim().to_ascii_uppercase(),
            zip_code: zip.as_str().to_string(),
            phone: draft.phone.trim().to_string(),
            is_default: draft.is_default,
        }),
        _ => Err(errors),
    }
}

/// An address being created or edited.
#[derive(Debug, Clone, Default)]
pub struct AddressForm {
    draft: AddressDraft,
    editing: Option<AddressId>,
    errors: FieldErrors,
    state_set_manually: bool,
    confirmed: Option<AddressDraft>,
}

impl AddressForm {
    /// An empty form for a new address.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A form pre-filled from a saved address.
    #[must_use]
    pub fn edit(id: AddressId, draft: AddressDraft) -> Self {
        Self {
            draft,
            editing: Some(id),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn draft(&self) -> &AddressDraft {
        &self.draft
    }

    /// The saved address being edited, if any.
    #[must_use]
    pub const fn editing(&self) -> Option<AddressId> {
        self.editing
    }

    #[must_use]
    pub const fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// The last successfully validated draft, if nothing changed since.
    #[must_use]
    pub const fn confirmed(&self) -> Option<&AddressDraft> {
        self.confirmed.as_ref()
    }

    fn slot(&mut self, field: AddressField) -> FieldSlot<'_> {
        let d = &mut self.draft;
        match field {
            AddressField::Label => FieldSlot::Optional(&mut d.label),
            AddressField::Complement => FieldSlot::Optional(&mut d.complement),
            AddressField::RecipientName => FieldSlot::Required(&mut d.recipient_name),
            AddressField::Street => FieldSlot::Required(&mut d.street),
            AddressField::Number => FieldSlot::Required(&mut d.number),
            AddressField::Neighborhood => FieldSlot::Required(&mut d.neighborhood),
            AddressField::City => FieldSlot::Required(&mut d.city),
            AddressField::State => FieldSlot::Required(&mut d.state),
            AddressField::ZipCode => FieldSlot::Required(&mut d.zip_code),
            AddressField::Phone => FieldSlot::Required(&mut d.phone),
        }
    }

    /// Set one field from shopper input.
    ///
    /// Clears that field's error only if the value actually changed. Typing
    /// into the city field drops any previously resolved city ID.
    pub fn set_field(&mut self, field: AddressField, value: impl Into<String>) {
        let value = value.into();
        let changed = match self.slot(field) {
            FieldSlot::Required(slot) => {
                let changed = *slot != value;
                *slot = value;
                changed
            }
            FieldSlot::Optional(slot) => {
                let value = Some(value).filter(|v| !v.is_empty());
                let changed = *slot != value;
                *slot = value;
                changed
            }
        };

        if field == AddressField::State {
            self.state_set_manually = true;
        }
        if changed {
            self.errors.remove(field);
            self.confirmed = None;
            if field == AddressField::City {
                self.draft.city_id = None;
            }
        }
    }

    pub fn set_default(&mut self, is_default: bool) {
        if self.draft.is_default != is_default {
            self.draft.is_default = is_default;
            self.confirmed = None;
        }
    }

    /// Pick a city from the reference list.
    ///
    /// The state follows the city unless the shopper typed a different
    /// state themselves.
    pub fn select_city(&mut self, city: &City) {
        let city_changed = self.draft.city != city.name || self.draft.city_id != Some(city.id);
        self.draft.city.clone_from(&city.name);
        self.draft.city_id = Some(city.id);
        if city_changed {
            self.errors.remove(AddressField::City);
            self.confirmed = None;
        }

        let state_matches = self.draft.state.trim().eq_ignore_ascii_case(&city.state);
        if !state_matches && (!self.state_set_manually || blank(&self.draft.state)) {
            self.draft.state.clone_from(&city.state);
            self.errors.remove(AddressField::State);
            self.confirmed = None;
        }
    }

    /// Link free-text city input to a reference record when one matches.
    ///
    /// Returns whether a city was linked.
    pub fn resolve_city(&mut self, cities: &[City]) -> bool {
        if self.draft.city_id.is_some() {
            return false;
        }
        match super::city::resolve_city(cities, &self.draft.city, &self.draft.state) {
            Some(city) => {
                self.draft.city_id = Some(city.id);
                true
            }
            None => false,
        }
    }

    /// Validate the current draft, replacing the error map.
    ///
    /// # Errors
    ///
    /// Returns the failing fields; they are also kept on the form.
    pub fn confirm(&mut self, cities: &[City]) -> Result<&AddressDraft, FieldErrors> {
        self.resolve_city(cities);
        match validate(&self.draft, cities) {
            Ok(valid) => {
                self.errors = FieldErrors::default();
                Ok(self.confirmed.insert(valid))
            }
            Err(errors) => {
                self.errors = errors.clone();
                self.confirmed = None;
                Err(errors)
            }
        }
    }
}

enum FieldSlot<'a> {
    Required(&'a mut String),
    Optional(&'a mut Option<String>),
}
