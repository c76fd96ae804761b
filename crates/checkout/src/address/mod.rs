//! Shipping addresses: saved records, drafts, validation and selection.
//!
//! # Modules
//!
//! - [`city`] - City reference records and free-text city matching
//! - [`form`] - Editable draft with per-field validation errors
//! - [`resolver`] - Which address a checkout session ships to

pub mod city;
pub mod form;
pub mod resolver;

use marketplace_core::{AddressId, CityId};
use serde::{Deserialize, Serialize};

pub use city::City;
pub use form::{AddressField, AddressForm, FieldErrors, validate};
pub use resolver::{AddressResolver, ResolvedAddress};

/// A shipping address saved by the address service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub id: AddressId,
    #[serde(default)]
    pub label: Option<String>,
    pub recipient_name: String,
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    /// Reference city, when the address was resolved against the city list.
    #[serde(default)]
    pub city_id: Option<CityId>,
    /// Two-letter state code (UF).
    pub state: String,
    /// Eight digits, as stored by the service.
    pub zip_code: String,
    pub phone: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Address fields as entered by the shopper, before or after validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressDraft {
    pub label: Option<String>,
    pub recipient_name: String,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub city_id: Option<CityId>,
    pub state: String,
    pub zip_code: String,
    pub phone: String,
    pub is_default: bool,
}

impl From<&ShippingAddress> for AddressDraft {
    fn from(address: &ShippingAddress) -> Self {
        Self {
            label: address.label.clone(),
            recipient_name: address.recipient_name.clone(),
            street: address.street.clone(),
            number: address.number.clone(),
            complement: address.complement.clone(),
            neighborhood: address.neighborhood.clone(),
            city: address.city.clone(),
            city_id: address.city_id,
            state: address.state.clone(),
            zip_code: address.zip_code.clone(),
            phone: address.phone.clone(),
            is_default: address.is_default,
        }
    }
}

/// Anything that can be printed as a shipping address.
pub trait AddressLines {
    fn street_line(&self) -> String;
    fn city_line(&self) -> String;
    fn zip_line(&self) -> String;
}

fn street_line(street: &str, number: &str, complement: Option<&str>) -> String {
    let mut line = format!("{}, {}", street.trim(), number.trim());
    if let Some(complement) = complement.map(str::trim).filter(|c| !c.is_empty()) {
        line.push_str(" - ");
        line.push_str(complement);
    }
    line
}

fn city_line(neighborhood: &str, city: &str, state: &str) -> String {
    let neighborhood = neighborhood.trim();
    if neighborhood.is_empty() {
        format!("{}/{}", city.trim(), state.trim())
    } else {
        format!("{neighborhood} - {}/{}", city.trim(), state.trim())
    }
}

fn zip_line(zip: &str) -> String {
    marketplace_core::ZipCode::parse(zip)
        .map_or_else(|_| format!("CEP {}", zip.trim()), |z| format!("CEP {}", z.formatted()))
}

impl AddressLines for ShippingAddress {
    fn street_line(&self) -> String {
        street_line(&self.street, &self.number, self.complement.as_deref())
    }

    fn city_line(&self) -> String {
        city_line(&self.neighborhood, &self.city, &self.state)
    }

    fn zip_line(&self) -> String {
        zip_line(&self.zip_code)
    }
}

impl AddressLines for AddressDraft {
    fn street_line(&self) -> String {
        street_line(&self.street, &self.number, self.complement.as_deref())
    }

    fn city_line(&self) -> String {
        city_line(&self.neighborhood, &self.city, &self.state)
    }

    fn zip_line(&self) -> String {
        zip_line(&self.zip_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_lines() {
        let draft = AddressDraft {
            street: "Av. Paulista".to_string(),
            number: "1578".to_string(),
            complement: Some("Apto 12".to_string()),
            neighborhood: "Bela Vista".to_string(),
            city: "São Paulo".to_string(),
            state: "SP".to_string(),
            zip_code: "01310200".to_string(),
            ..AddressDraft::default()
        };

        assert_eq!(draft.street_line(), "Av. Paulista, 1578 - Apto 12");
        assert_eq!(draft.city_line(), "Bela Vista - São Paulo/SP");
        assert_eq!(draft.zip_line(), "CEP 01310-200");
    }

    #[test]
    fn test_blank_complement_is_omitted() {
        let draft = AddressDraft {
            street: "Rua A".to_string(),
            number: "1".to_string(),
            complement: Some("  ".to_string()),
            ..AddressDraft::default()
        };
        assert_eq!(draft.street_line(), "Rua A, 1");
    }
}
