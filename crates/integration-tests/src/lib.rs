//! End-to-end checkout scenarios for the marketplace.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p marketplace-integration-tests
//! ```
//!
//! No external services are needed: scenarios run either against the
//! in-memory fakes from `marketplace_checkout::testing` or against a local
//! `wiremock` server standing in for the marketplace data service.
//!
//! # Test Categories
//!
//! - `checkout_scenarios` - Shopper journeys through the state machine
//! - `http_checkout` - The same journeys over the HTTP client

use std::time::Duration;

use marketplace_checkout::address::AddressField;
use marketplace_checkout::config::ApiConfig;
use marketplace_checkout::testing::FakeServices;
use marketplace_checkout::{CheckoutOrchestrator, FlowSettings, SessionContext, WatchConfig};
use secrecy::SecretString;
use url::Url;

/// Storefront base used for order detail links.
pub const STOREFRONT: &str = "https://loja.example/";

/// Settings with the default 5s polling interval and 2s success delay.
#[must_use]
pub fn flow_settings() -> FlowSettings {
    FlowSettings {
        storefront_url: Url::parse(STOREFRONT).expect("storefront url"),
        watch: WatchConfig::default(),
        use_sandbox: false,
    }
}

/// A checkout driven by in-memory fakes.
pub struct Harness {
    pub fakes: FakeServices,
    pub checkout: CheckoutOrchestrator,
}

impl Harness {
    #[must_use]
    pub fn new(fakes: FakeServices) -> Self {
        let checkout =
            CheckoutOrchestrator::new(fakes.services(), flow_settings(), SessionContext::new());
        Self { fakes, checkout }
    }

    /// Calls that reached the order service, of any kind.
    #[must_use]
    pub fn order_service_calls(&self) -> usize {
        self.fakes.orders.create_calls()
            + self.fakes.orders.preference_calls()
            + self.fakes.orders.get_order_calls()
    }
}

/// Type a complete address in Recife into the open form, with `zip`.
///
/// # Panics
///
/// Panics if no address form is open.
pub fn fill_address(checkout: &mut CheckoutOrchestrator, zip: &str) {
    let fields = [
        (AddressField::RecipientName, "Joana Lima"),
        (AddressField::Street, "Rua da Aurora"),
        (AddressField::Number, "300"),
        (AddressField::Neighborhood, "Boa Vista"),
        (AddressField::City, "Recife"),
        (AddressField::State, "PE"),
        (AddressField::ZipCode, zip),
        (AddressField::Phone, "(81) 99876-5432"),
    ];
    for (field, value) in fields {
        checkout
            .set_address_field(field, value)
            .expect("address form open");
    }
}

/// Client settings pointing at a mock data service.
#[must_use]
pub fn api_config(server_uri: &str) -> ApiConfig {
    ApiConfig {
        base_url: Url::parse(&format!("{server_uri}/")).expect("mock server url"),
        token: SecretString::from("tk_test_integration"),
        timeout: Duration::from_secs(5),
        city_cache_ttl: Duration::from_secs(60),
        use_sandbox: false,
    }
}
