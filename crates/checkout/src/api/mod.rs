//! HTTP client for the marketplace data service.
//!
//! [`ApiClient`] implements every data-service port over the service's
//! JSON REST API, bearer-token authenticated.
//!
//! # Status mapping
//!
//! | Response                         | Error kind   |
//! |----------------------------------|--------------|
//! | 400, 422                         | `Validation` |
//! | 409                              | `Conflict`   |
//! | 408, 502, 503, 504, transport    | `Network`    |
//! | any non-2xx on create-preference | `Provider`   |
//! | anything else, undecodable body  | `Unexpected` |
//!
//! The city reference list is cached with `moka`.

mod conversions;
mod types;

use std::sync::Arc;

use async_trait::async_trait;
use marketplace_core::{AddressId, CartItemId, OrderId, PaymentMethod, StoreId};
use moka::future::Cache;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::address::{AddressDraft, City, ShippingAddress};
use crate::cart::CartAggregate;
use crate::config::ApiConfig;
use crate::error::{CheckoutError, Result};
use crate::order::{CheckoutPayload, Order, PaymentPreference};
use crate::ports::{AddressService, CartService, CityService, OrderService, PaymentMethodService};

use conversions::{convert_cart, convert_payment_methods, error_message};
use types::{CartResponse, PaymentMethodsResponse, PreferenceRequest, QuantityRequest};

const CITIES_KEY: &str = "cities";

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the marketplace data service.
///
/// Cheap to clone; all clones share one connection pool and cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    cities: Cache<&'static str, Arc<[City]>>,
}

impl ApiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `Unexpected` if the token is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&config.bearer())
            .map_err(|e| CheckoutError::Unexpected(format!("Invalid API token format: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| CheckoutError::Unexpected(format!("HTTP client: {e}")))?;

        let cities = Cache::builder()
            .max_capacity(1)
            .time_to_live(config.city_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                cities,
            }),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| CheckoutError::Unexpected(format!("Invalid path {path}: {e}")))
    }

    /// Send a request, mapping transport failures and non-2xx statuses.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.inner.client.get(self.url(path)?)).await?;
        read_json(response).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let text = response.text().await.map_err(transport_error)?;
    serde_json::from_str(&text).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %text.chars().take(500).collect::<String>(),
            "Failed to parse marketplace API response"
        );
        CheckoutError::Unexpected(format!("Malformed response: {e}"))
    })
}

fn transport_error(e: reqwest::Error) -> CheckoutError {
    if e.is_decode() {
        CheckoutError::Unexpected(e.to_string())
    } else {
        CheckoutError::Network(e.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> CheckoutError {
    let message = error_message(body);
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            CheckoutError::Validation(message)
        }
        StatusCode::CONFLICT => CheckoutError::Conflict(message),
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => CheckoutError::Network(format!("HTTP {status}")),
        _ => {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Marketplace API returned non-success status"
            );
            CheckoutError::Unexpected(format!("HTTP {status}: {message}"))
        }
    }
}

// =============================================================================
// Port implementations
// =============================================================================

#[async_trait]
impl CartService for ApiClient {
    #[instrument(skip(self))]
    async fn get_cart(&self) -> Result<CartAggregate> {
        let response: CartResponse = self.get_json("cart").await?;
        convert_cart(response)
    }

    #[instrument(skip(self))]
    async fn update_item_quantity(&self, item_id: CartItemId, quantity: u32) -> Result<()> {
        let url = self.url(&format!("cart/items/{item_id}"))?;
        self.send(
            self.inner
                .client
                .put(url)
                .json(&QuantityRequest { quantity }),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_item(&self, item_id: CartItemId) -> Result<()> {
        let url = self.url(&format!("cart/items/{item_id}"))?;
        self.send(self.inner.client.delete(url)).await?;
        Ok(())
    }
}

#[async_trait]
impl AddressService for ApiClient {
    #[instrument(skip(self))]
    async fn list_addresses(&self) -> Result<Vec<ShippingAddress>> {
        self.get_json("addresses").await
    }

    #[instrument(skip(self, draft))]
    async fn create_address(&self, draft: &AddressDraft) -> Result<ShippingAddress> {
        let url = self.url("addresses")?;
        let response = self.send(self.inner.client.post(url).json(draft)).await?;
        read_json(response).await
    }

    #[instrument(skip(self, draft))]
    async fn update_address(&self, id: AddressId, draft: &AddressDraft) -> Result<ShippingAddress> {
        let url = self.url(&format!("addresses/{id}"))?;
        let response = self.send(self.inner.client.put(url).json(draft)).await?;
        read_json(response).await
    }

    #[instrument(skip(self))]
    async fn set_default_address(&self, id: AddressId) -> Result<()> {
        let url = self.url(&format!("addresses/{id}/default"))?;
        self.send(self.inner.client.patch(url)).await?;
        Ok(())
    }
}

#[async_trait]
impl CityService for ApiClient {
    #[instrument(skip(self))]
    async fn list_cities(&self) -> Result<Vec<City>> {
        if let Some(cities) = self.inner.cities.get(CITIES_KEY).await {
            debug!("Cache hit for cities");
            return Ok(cities.to_vec());
        }

        let cities: Vec<City> = self.get_json("cities").await?;
        self.inner
            .cities
            .insert(CITIES_KEY, Arc::from(cities.clone()))
            .await;
        Ok(cities)
    }
}

#[async_trait]
impl PaymentMethodService for ApiClient {
    #[instrument(skip(self))]
    async fn accepted_methods(&self, store_id: StoreId) -> Result<Vec<PaymentMethod>> {
        let response: PaymentMethodsResponse = self
            .get_json(&format!("stores/{store_id}/payment-methods"))
            .await?;
        Ok(convert_payment_methods(&response.payment_methods))
    }
}

#[async_trait]
impl OrderService for ApiClient {
    #[instrument(skip(self, payload), fields(store_id = %payload.store_id, idempotency_key = %payload.idempotency_key))]
    async fn create_order(&self, payload: &CheckoutPayload) -> Result<Order> {
        let url = self.url("orders")?;
        let request = self
            .inner
            .client
            .post(url)
            .header("Idempotency-Key", payload.idempotency_key.to_string())
            .json(payload);
        let order: Order = read_json(self.send(request).await?).await?;
        debug!(order_id = %order.id, "Order created");
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn create_payment_preference(
        &self,
        order_id: OrderId,
        store_id: StoreId,
    ) -> Result<PaymentPreference> {
        let url = self.url("payments/create-preference")?;
        let response = self
            .inner
            .client
            .post(url)
            .json(&PreferenceRequest { order_id, store_id })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckoutError::Provider {
                order_id,
                message: format!("HTTP {status}: {}", error_message(&body)),
            });
        }
        read_json(response).await
    }

    #[instrument(skip(self))]
    async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.get_json(&format!("orders/{order_id}")).await
    }

    #[instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>> {
        self.get_json("orders").await
    }
}
