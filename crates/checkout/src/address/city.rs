//! City reference records used to normalize the address city field.

use marketplace_core::CityId;
use serde::{Deserialize, Serialize};

/// A city from the reference list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub name: String,
    /// Two-letter state code (UF).
    pub state: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

fn same_state(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Active cities of one state, as offered by the city picker.
pub fn cities_in_state<'a>(cities: &'a [City], state: &str) -> impl Iterator<Item = &'a City> {
    let state = state.trim().to_ascii_uppercase();
    cities
        .iter()
        .filter(move |c| c.active && same_state(&c.state, &state))
}

/// Find a city by its ID.
#[must_use]
pub fn find_city(cities: &[City], id: CityId) -> Option<&City> {
    cities.iter().find(|c| c.id == id)
}

/// Match free-text city input against the reference list.
///
/// 1. Exact name match (case-insensitive) in the typed state. Without a
///    typed state, an exact name is only accepted if it is unambiguous.
/// 2. Substring match within the typed state.
/// 3. Otherwise `None`: the caller keeps the raw text.
#[must_use]
pub fn resolve_city<'a>(cities: &'a [City], name: &str, state: &str) -> Option<&'a City> {
    let wanted = fold(name);
    if wanted.is_empty() {
        return None;
    }

    let active = || cities.iter().filter(|c| c.active);
    let has_state = !state.trim().is_empty();

    if has_state {
        if let Some(city) = active().find(|c| fold(&c.name) == wanted && same_state(&c.state, state))
        {
            return Some(city);
        }
        return active().find(|c| same_state(&c.state, state) && fold(&c.name).contains(&wanted));
    }

    let mut exact = active().filter(|c| fold(&c.name) == wanted);
    match (exact.next(), exact.next()) {
        (Some(city), None) => Some(city),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn city(id: i64, name: &str, state: &str) -> City {
        City {
            id: CityId::new(id),
            name: name.to_string(),
            state: state.to_string(),
            active: true,
        }
    }

    fn reference() -> Vec<City> {
        vec![
            city(1, "São Paulo", "SP"),
            city(2, "Santos", "SP"),
            city(3, "Bom Jesus", "PI"),
            city(4, "Bom Jesus", "RS"),
            city(5, "São José dos Campos", "SP"),
            City {
                active: false,
                ..city(6, "Cidade Extinta", "SP")
            },
        ]
    }

    #[test]
    fn test_exact_pair_wins_over_ambiguous_name() {
        let cities = reference();
        assert_eq!(
            resolve_city(&cities, "bom jesus", "RS").unwrap().id,
            CityId::new(4)
        );
        assert_eq!(
            resolve_city(&cities, "Bom Jesus", "pi").unwrap().id,
            CityId::new(3)
        );
    }

    #[test]
    fn test_ambiguous_name_without_state_is_rejected() {
        let cities = reference();
        assert!(resolve_city(&cities, "Bom Jesus", "").is_none());
        assert_eq!(
            resolve_city(&cities, "Santos", "").unwrap().id,
            CityId::new(2)
        );
    }

    #[test]
    fn test_substring_within_same_state() {
        let cities = reference();
        assert_eq!(
            resolve_city(&cities, "josé dos", "SP").unwrap().id,
            CityId::new(5)
        );
        // Same text in another state does not match
        assert!(resolve_city(&cities, "josé dos", "RJ").is_none());
    }

    #[test]
    fn test_unknown_city_keeps_raw_text() {
        let cities = reference();
        assert!(resolve_city(&cities, "Atlântida", "SP").is_none());
        assert!(resolve_city(&cities, "   ", "SP").is_none());
    }

    #[test]
    fn test_inactive_cities_are_ignored() {
        let cities = reference();
        assert!(resolve_city(&cities, "Cidade Extinta", "SP").is_none());
        assert_eq!(cities_in_state(&cities, "sp").count(), 3);
    }
}
