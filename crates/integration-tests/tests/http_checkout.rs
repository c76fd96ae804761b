//! Checkout journeys over the HTTP client against a mock data service.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use marketplace_checkout::payments::retry_payment;
use marketplace_checkout::testing::RecordingNavigator;
use marketplace_checkout::{
    ApiClient, CheckoutOrchestrator, CheckoutState, ErrorKind, SessionContext, Services,
    StoreCartGroup, SubmitOutcome,
};
use marketplace_core::{OrderId, PaymentMethod, StoreId};
use marketplace_integration_tests::{api_config, flow_settings};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_HEADER: &str = "Bearer tk_test_integration";

fn cart_json() -> Value {
    json!({
        "stores": [{
            "store_id": 7,
            "store_name": "Empório Serra",
            "store_whatsapp": "(31) 3333-4444",
            "items": [
                {"id": 71, "product_id": 501, "product_name": "Café Especial 250g", "unit_price": "32.50", "quantity": 2, "stock": 12},
                {"id": 72, "product_id": 502, "product_name": "Doce de Leite", "unit_price": "18.00", "quantity": 1},
            ],
        }],
    })
}

fn order_json(id: i64) -> Value {
    json!({
        "id": id,
        "store_id": 7,
        "items": [
            {"product_id": 501, "name": "Café Especial 250g", "quantity": 2, "unit_price": "32.50", "subtotal": "65.00"},
            {"product_id": 502, "name": "Doce de Leite", "quantity": 1, "unit_price": "18.00", "subtotal": "18.00"},
        ],
        "subtotal": "83.00",
        "shipping_cost": "12.00",
        "total": "95.00",
        "status": "pending",
        "payment_status": "pending",
        "payment_method": "mercadopago",
    })
}

async fn mount_session_data(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/stores/7/payment-methods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "payment_methods": ["mercadopago", "whatsapp"],
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/addresses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 31,
            "recipient_name": "Paulo Reis",
            "street": "Rua Pernambuco",
            "number": "1000",
            "neighborhood": "Savassi",
            "city": "Belo Horizonte",
            "state": "MG",
            "zip_code": "30130151",
            "phone": "31988887777",
            "is_default": true,
        }])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 3106200, "name": "Belo Horizonte", "state": "MG"},
        ])))
        .expect(1)
        .mount(server)
        .await;
}

struct HttpHarness {
    client: ApiClient,
    navigator: Arc<RecordingNavigator>,
    checkout: CheckoutOrchestrator,
}

async fn open_checkout(server: &MockServer) -> HttpHarness {
    let client = ApiClient::new(&api_config(&server.uri())).unwrap();
    let navigator = Arc::new(RecordingNavigator::default());
    let services = Services::from_client(client.clone(), navigator.clone());
    let mut checkout =
        CheckoutOrchestrator::new(services, flow_settings(), SessionContext::new());

    let cart = marketplace_checkout::ports::CartService::get_cart(&client)
        .await
        .unwrap();
    let group: StoreCartGroup = cart.group(StoreId::new(7)).cloned().unwrap();
    checkout.begin(group).await.unwrap();
    checkout.load_cities().await;

    HttpHarness {
        client,
        navigator,
        checkout,
    }
}

#[tokio::test]
async fn test_gateway_checkout_over_http() {
    let server = MockServer::start().await;
    mount_session_data(&server).await;
    Mock::given(method("GET"))
        .and(path("/cart"))
        .and(header("authorization", TOKEN_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_json()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header_exists("idempotency-key"))
        .and(body_partial_json(json!({
            "store_id": 7,
            "shipping_address_id": 31,
            "payment_method": "mercadopago",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(order_json(9001)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payments/create-preference"))
        .and(body_partial_json(json!({"order_id": 9001, "store_id": 7})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "init_point": "https://www.mercadopago.com.br/checkout/v1/redirect?pref_id=9001-abc",
            "sandbox_init_point": "https://sandbox.mercadopago.com.br/checkout/v1/redirect?pref_id=9001-abc",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut h = open_checkout(&server).await;
    assert_eq!(h.checkout.state(), &CheckoutState::MethodReady);
    let session = h.checkout.session().unwrap();
    assert_eq!(session.selected_method(), Some(PaymentMethod::Gateway));
    assert!(session.address().selected().unwrap().city_id.is_some());

    let outcome = h.checkout.submit().await.unwrap();

    let SubmitOutcome::Redirect { order_id, url } = outcome else {
        panic!("expected a redirect");
    };
    assert_eq!(order_id, OrderId::new(9001));
    assert_eq!(url.host_str(), Some("www.mercadopago.com.br"));
    assert_eq!(h.navigator.navigations(), vec![url]);
    assert!(h.checkout.payment_watch().is_none());
}

#[tokio::test]
async fn test_direct_message_checkout_over_http() {
    let server = MockServer::start().await;
    mount_session_data(&server).await;
    Mock::given(method("GET"))
        .and(path("/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_json()))
        .mount(&server)
        .await;
    let mut order = order_json(9002);
    order["payment_method"] = json!("whatsapp");
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_partial_json(json!({
            "payment_method": "whatsapp",
            "notes": "Interfone 12",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(order))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payments/create-preference"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut h = open_checkout(&server).await;
    h.checkout
        .select_payment_method(PaymentMethod::DirectMessage)
        .unwrap();
    h.checkout
        .set_notes(Some("Interfone 12".to_string()))
        .unwrap();

    let SubmitOutcome::Handoff { handoff, .. } = h.checkout.submit().await.unwrap() else {
        panic!("expected a handoff");
    };

    let url = handoff.url.unwrap();
    assert_eq!(url.path(), "/553133334444");
    assert_eq!(h.navigator.external(), vec![url]);
    assert!(handoff.message.contains("• 2x Café Especial 250g - R$ 65,00"));
    assert!(handoff.message.contains("Frete: R$ 12,00"));
    assert!(handoff.message.contains("Total: R$ 95,00"));
    assert!(handoff.message.contains("Observações: Interfone 12"));
}

#[tokio::test]
async fn test_cart_conflict_over_http() {
    let server = MockServer::start().await;
    mount_session_data(&server).await;
    // First read opens the dialog, the re-read at submit finds the store gone
    Mock::given(method("GET"))
        .and(path("/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_json()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"stores": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(order_json(1)))
        .expect(0)
        .mount(&server)
        .await;

    let mut h = open_checkout(&server).await;
    let err = h.checkout.submit().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.checkout.state(), &CheckoutState::MethodReady);
}

#[tokio::test]
async fn test_order_rejection_over_http_keeps_session() {
    let server = MockServer::start().await;
    mount_session_data(&server).await;
    Mock::given(method("GET"))
        .and(path("/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_json()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({"message": "Não entregamos neste CEP"})),
        )
        .mount(&server)
        .await;

    let mut h = open_checkout(&server).await;
    let err = h.checkout.submit().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        h.checkout.state(),
        &CheckoutState::Failed {
            kind: ErrorKind::Validation,
            message: "Não entregamos neste CEP".to_string(),
        }
    );
    assert!(h.checkout.session().unwrap().address().selected().is_some());
    assert!(h.navigator.navigations().is_empty());
}

#[tokio::test]
async fn test_retry_payment_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/9001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json(9001)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payments/create-preference"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "init_point": "https://www.mercadopago.com.br/checkout/v1/redirect?pref_id=retry",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&api_config(&server.uri())).unwrap();
    let navigator = Arc::new(RecordingNavigator::default());
    let services = Services::from_client(client, navigator.clone());

    let url = retry_payment(&services, &flow_settings(), OrderId::new(9001), StoreId::new(7))
        .await
        .unwrap();

    assert!(url.as_str().ends_with("pref_id=retry"));
    assert_eq!(navigator.navigations(), vec![url]);
}

#[tokio::test]
async fn test_cities_fetched_once_per_client() {
    let server = MockServer::start().await;
    mount_session_data(&server).await;
    Mock::given(method("GET"))
        .and(path("/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_json()))
        .mount(&server)
        .await;

    let mut h = open_checkout(&server).await;
    // Re-opening reuses the session context's list; the mock expects one call
    let group = h.checkout.session().unwrap().group().clone();
    h.checkout.begin(group).await.unwrap();
    assert!(!h.checkout.session().unwrap().address().prefill_pending());
    h.checkout.load_cities().await;

    let cities = marketplace_checkout::ports::CityService::list_cities(&h.client)
        .await
        .unwrap();
    assert_eq!(cities.len(), 1);
}
