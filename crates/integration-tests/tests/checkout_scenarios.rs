//! Shopper journeys through the checkout state machine.
//!
//! Every collaborator is an in-memory fake that counts its calls, so each
//! scenario can assert on exactly what reached the network.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use marketplace_checkout::address::AddressField;
use marketplace_checkout::order::ShippingTarget;
use marketplace_checkout::testing::{FakeServices, sample_address, sample_group, sample_pix};
use marketplace_checkout::{CheckoutError, CheckoutState, ErrorKind, Notice, SubmitOutcome};
use marketplace_core::{AddressId, OrderId, PaymentMethod, PaymentStatus, StoreId};
use marketplace_integration_tests::{Harness, fill_address};
use url::Url;

fn gateway_store() -> FakeServices {
    FakeServices::new(
        vec![sample_group(StoreId::new(1), true)],
        vec![sample_address(10, true)],
        vec![PaymentMethod::Gateway, PaymentMethod::DirectMessage],
    )
}

fn inline_pix_store() -> Harness {
    let fakes = gateway_store();
    fakes.orders.with_inline_pix(Some(sample_pix()));
    Harness::new(fakes)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_saved_default_address_gateway_redirect() {
    let mut h = Harness::new(gateway_store());
    h.checkout
        .begin(sample_group(StoreId::new(1), true))
        .await
        .unwrap();
    assert_eq!(h.checkout.state(), &CheckoutState::MethodReady);

    let outcome = h.checkout.submit().await.unwrap();

    let SubmitOutcome::Redirect { order_id, url } = outcome else {
        panic!("expected a redirect");
    };
    assert_eq!(url.as_str(), format!("https://pay.example/checkout/{order_id}"));
    assert_eq!(h.fakes.navigator.navigations(), vec![url]);
    assert_eq!(h.fakes.orders.create_calls(), 1);
    // No polling for redirected payments
    assert!(h.checkout.payment_watch().is_none());
    assert_eq!(h.fakes.orders.get_order_calls(), 0);

    let payload = h.fakes.orders.payloads().into_iter().next().unwrap();
    assert_eq!(payload.shipping, ShippingTarget::Saved(AddressId::new(10)));
    assert_eq!(payload.payment_method, PaymentMethod::Gateway);
}

#[tokio::test]
async fn test_checkout_disabled_store_hands_off_by_direct_message() {
    let fakes = FakeServices::new(
        vec![sample_group(StoreId::new(2), false)],
        Vec::new(),
        vec![PaymentMethod::Gateway],
    );
    let mut h = Harness::new(fakes);

    h.checkout
        .begin(sample_group(StoreId::new(2), false))
        .await
        .unwrap();

    // Form shown immediately, method forced without asking the store
    assert_eq!(h.checkout.state(), &CheckoutState::AddressPending);
    let session = h.checkout.session().unwrap();
    assert!(session.address().form().is_some());
    assert_eq!(session.available_methods(), &[PaymentMethod::DirectMessage]);
    assert_eq!(session.selected_method(), Some(PaymentMethod::DirectMessage));
    assert_eq!(h.fakes.payment_methods.calls(), 0);

    fill_address(&mut h.checkout, "50050-000");
    let outcome = h.checkout.submit().await.unwrap();

    let SubmitOutcome::Handoff { order, handoff } = outcome else {
        panic!("expected a direct-message handoff");
    };
    let url = handoff.url.clone().unwrap();
    assert_eq!(url.host_str(), Some("wa.me"));
    assert_eq!(url.path(), "/5511987654321");
    assert_eq!(h.fakes.navigator.external(), vec![url.clone()]);
    assert!(handoff.message.contains(&format!("pedido #{}", order.id)));
    assert!(handoff.message.contains("• 2x Produto 201 - R$ 20,00"));
    assert!(handoff.message.contains("Total: R$ 30,00"));
    assert!(handoff.message.contains("CEP 50050-000"));
    assert_eq!(
        h.checkout.state(),
        &CheckoutState::HandoffReady {
            order_id: order.id,
            url: Some(url)
        }
    );
    assert_eq!(h.fakes.orders.preference_calls(), 0);
}

#[tokio::test]
async fn test_formatted_zip_is_normalized() {
    let fakes = FakeServices::new(
        vec![sample_group(StoreId::new(1), true)],
        Vec::new(),
        vec![PaymentMethod::Gateway],
    );
    let mut h = Harness::new(fakes);
    h.checkout
        .begin(sample_group(StoreId::new(1), true))
        .await
        .unwrap();

    fill_address(&mut h.checkout, "01310-100");
    h.checkout.confirm_address().unwrap();
    assert_eq!(h.checkout.state(), &CheckoutState::MethodReady);

    h.checkout.submit().await.unwrap();
    let payload = h.fakes.orders.payloads().into_iter().next().unwrap();
    let ShippingTarget::New(draft) = payload.shipping else {
        panic!("expected an inline address");
    };
    assert_eq!(draft.zip_code, "01310100");
    assert_eq!(draft.state, "PE");
}

#[tokio::test]
async fn test_short_zip_blocks_submission_without_network() {
    let fakes = FakeServices::new(
        vec![sample_group(StoreId::new(1), true)],
        Vec::new(),
        vec![PaymentMethod::Gateway],
    );
    let mut h = Harness::new(fakes);
    h.checkout
        .begin(sample_group(StoreId::new(1), true))
        .await
        .unwrap();

    fill_address(&mut h.checkout, "1234");
    let err = h.checkout.submit().await.unwrap_err();

    let CheckoutError::InvalidFields(fields) = err else {
        panic!("expected field errors, got {err:?}");
    };
    assert_eq!(fields.len(), 1);
    assert_eq!(fields.get(AddressField::ZipCode), Some("CEP deve ter 8 dígitos"));
    assert!(
        h.checkout
            .session()
            .unwrap()
            .validation_errors()
            .contains(AddressField::ZipCode)
    );
    assert_eq!(h.checkout.state(), &CheckoutState::AddressPending);
    assert_eq!(h.fakes.cart.get_cart_calls(), 0);
    assert_eq!(h.order_service_calls(), 0);

    // Fixing the field clears its error and unblocks submission
    h.checkout
        .set_address_field(AddressField::ZipCode, "50050000")
        .unwrap();
    assert!(h.checkout.session().unwrap().validation_errors().is_empty());
    h.checkout.submit().await.unwrap();
    assert_eq!(h.fakes.orders.create_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_inline_pix_settles_on_fourth_poll() {
    let mut h = inline_pix_store();
    h.fakes.orders.script_statuses([
        Ok(PaymentStatus::Pending),
        Ok(PaymentStatus::Pending),
        Ok(PaymentStatus::Pending),
        Ok(PaymentStatus::Paid),
    ]);
    h.checkout
        .begin(sample_group(StoreId::new(1), true))
        .await
        .unwrap();

    let outcome = h.checkout.submit().await.unwrap();
    let SubmitOutcome::AwaitingPayment { order } = outcome else {
        panic!("expected inline payment");
    };
    assert!(order.inline_payment().is_some());
    assert_eq!(h.fakes.orders.preference_calls(), 0);
    assert_eq!(
        h.checkout.state(),
        &CheckoutState::PaymentPending {
            order_id: order.id,
            redirect: None
        }
    );

    tokio::time::sleep(Duration::from_secs(19)).await;
    assert_eq!(h.fakes.orders.get_order_calls(), 3);
    assert!(h.fakes.navigator.notices().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.fakes.orders.get_order_calls(), 4);
    assert_eq!(
        h.fakes.navigator.notices(),
        vec![Notice::PaymentConfirmed { order_id: order.id }]
    );
    // Success is shown before leaving the page
    assert!(h.fakes.navigator.navigations().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        h.fakes.navigator.navigations(),
        vec![Url::parse(&format!("https://loja.example/pedidos/{}", order.id)).unwrap()]
    );

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.fakes.orders.get_order_calls(), 4);
    let watch = h.checkout.payment_watch().unwrap();
    assert!(watch.is_finished());
    assert_eq!(watch.snapshot().payment_status, PaymentStatus::Paid);
}

#[tokio::test(start_paused = true)]
async fn test_closing_dialog_stops_polling() {
    let mut h = inline_pix_store();
    h.fakes.orders.script_statuses([Ok(PaymentStatus::Pending)]);
    h.checkout
        .begin(sample_group(StoreId::new(1), true))
        .await
        .unwrap();
    h.checkout.submit().await.unwrap();

    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(h.fakes.orders.get_order_calls(), 2);

    h.checkout.close();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(h.fakes.orders.get_order_calls(), 2);
    assert_eq!(h.checkout.state(), &CheckoutState::Idle);
    assert!(h.fakes.navigator.navigations().is_empty());
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn test_emptied_group_returns_to_method_ready_without_preference() {
    let mut h = Harness::new(gateway_store());
    h.checkout
        .begin(sample_group(StoreId::new(1), true))
        .await
        .unwrap();

    // Another tab empties this store's items
    h.fakes
        .cart
        .set_groups(vec![sample_group(StoreId::new(9), true)]);
    let err = h.checkout.submit().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.checkout.state(), &CheckoutState::MethodReady);
    assert_eq!(h.fakes.orders.create_calls(), 0);
    assert_eq!(h.fakes.orders.preference_calls(), 0);
}

#[tokio::test]
async fn test_failed_preference_never_creates_second_order() {
    let mut h = Harness::new(gateway_store());
    h.fakes
        .orders
        .set_preference(Some(Err(CheckoutError::Network("reset".to_string()))));
    h.checkout
        .begin(sample_group(StoreId::new(1), true))
        .await
        .unwrap();

    for attempt in 1..=3 {
        let err = h.checkout.submit().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider, "attempt {attempt}");
        assert_eq!(h.fakes.orders.create_calls(), 1, "attempt {attempt}");
        assert_eq!(h.fakes.orders.preference_calls(), attempt);
    }

    let pending = h.checkout.session().unwrap().pending_order().unwrap().id;
    assert_eq!(pending, OrderId::new(1001));
    assert!(h.fakes.navigator.navigations().is_empty());
}

#[tokio::test]
async fn test_submission_uses_live_cart_quantities() {
    let mut h = Harness::new(gateway_store());
    h.checkout
        .begin(sample_group(StoreId::new(1), true))
        .await
        .unwrap();

    let mut updated = sample_group(StoreId::new(1), true);
    for item in &mut updated.items {
        item.set_quantity(5).unwrap();
    }
    h.fakes.cart.set_groups(vec![updated.clone()]);
    h.checkout.submit().await.unwrap();

    let payload = h.fakes.orders.payloads().into_iter().next().unwrap();
    assert!(payload.items.iter().all(|item| item.quantity == 5));
    assert_eq!(h.checkout.session().unwrap().group(), &updated);
}

#[tokio::test]
async fn test_first_address_used_when_none_is_default() {
    let fakes = FakeServices::new(
        vec![sample_group(StoreId::new(1), true)],
        vec![sample_address(3, false), sample_address(4, false)],
        vec![PaymentMethod::Gateway],
    );
    let mut h = Harness::new(fakes);
    h.checkout
        .begin(sample_group(StoreId::new(1), true))
        .await
        .unwrap();

    let selected = h.checkout.session().unwrap().address().selected().unwrap();
    assert_eq!(selected.id, AddressId::new(3));
}

#[tokio::test]
async fn test_new_address_saved_as_default() {
    let mut h = Harness::new(gateway_store());
    h.checkout
        .begin(sample_group(StoreId::new(1), true))
        .await
        .unwrap();

    h.checkout.open_address_form().unwrap();
    assert_eq!(h.checkout.state(), &CheckoutState::AddressPending);
    fill_address(&mut h.checkout, "50050000");
    h.checkout.set_address_default(true).unwrap();
    let saved = h.checkout.save_address().await.unwrap();

    assert!(saved.is_default);
    assert_eq!(h.checkout.state(), &CheckoutState::MethodReady);
    let addresses = h.checkout.session().unwrap().address().addresses();
    assert_eq!(addresses.iter().filter(|a| a.is_default).count(), 1);

    h.checkout.submit().await.unwrap();
    let payload = h.fakes.orders.payloads().into_iter().next().unwrap();
    assert_eq!(payload.shipping, ShippingTarget::Saved(saved.id));
}
