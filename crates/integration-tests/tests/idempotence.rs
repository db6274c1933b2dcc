//! Replayed and out-of-order provider events.

#![allow(clippy::unwrap_used)]

use threadline_commerce::{AdminContext, EventKind, ReconcileOutcome};
use threadline_core::{OrderStatus, PaymentStatus, StockLevel};
use threadline_integration_tests::{
    PROVIDER_ORDER_ID, PROVIDER_PAYMENT_ID, add_variant, memory_commerce, place_order,
};

fn admin() -> AdminContext {
    AdminContext::new("ops@threadline.test")
}

#[tokio::test]
async fn test_double_capture_is_idempotent() {
    let commerce = memory_commerce();
    let variant = add_variant(&commerce, "JAR", 800, 5).await;
    let placed = place_order(&commerce, &[(variant, 2)], PROVIDER_ORDER_ID).await;

    let first = commerce
        .mark_captured(PROVIDER_ORDER_ID, PROVIDER_PAYMENT_ID)
        .await
        .unwrap();
    let second = commerce
        .mark_captured(PROVIDER_ORDER_ID, PROVIDER_PAYMENT_ID)
        .await
        .unwrap();

    assert_eq!(first, ReconcileOutcome::Applied(PaymentStatus::Captured));
    assert_eq!(
        second,
        ReconcileOutcome::AlreadySettled(PaymentStatus::Captured)
    );
    assert_eq!(
        commerce.stock_level(variant).await.unwrap(),
        StockLevel::new(3, 0)
    );
    let order = commerce.get_order(&admin(), placed.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_fail_after_capture_is_noop() {
    let commerce = memory_commerce();
    let variant = add_variant(&commerce, "BOWL", 650, 2).await;
    let placed = place_order(&commerce, &[(variant, 2)], PROVIDER_ORDER_ID).await;

    commerce
        .mark_captured(PROVIDER_ORDER_ID, PROVIDER_PAYMENT_ID)
        .await
        .unwrap();
    let outcome = commerce
        .mark_failed(PROVIDER_ORDER_ID, PROVIDER_PAYMENT_ID)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ReconcileOutcome::AlreadySettled(PaymentStatus::Captured)
    );
    let order = commerce.get_order(&admin(), placed.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment.unwrap().status, PaymentStatus::Captured);
    assert_eq!(
        commerce.stock_level(variant).await.unwrap(),
        StockLevel::new(0, 0)
    );
}

#[tokio::test]
async fn test_capture_after_failure_is_noop() {
    let commerce = memory_commerce();
    let variant = add_variant(&commerce, "PLATE", 450, 3).await;
    let placed = place_order(&commerce, &[(variant, 1)], PROVIDER_ORDER_ID).await;

    commerce
        .mark_failed(PROVIDER_ORDER_ID, PROVIDER_PAYMENT_ID)
        .await
        .unwrap();
    let outcome = commerce
        .mark_captured(PROVIDER_ORDER_ID, PROVIDER_PAYMENT_ID)
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::AlreadySettled(PaymentStatus::Failed));
    let order = commerce.get_order(&admin(), placed.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(
        commerce.stock_level(variant).await.unwrap(),
        StockLevel::new(3, 0)
    );
}

#[tokio::test]
async fn test_authorized_then_captured() {
    let commerce = memory_commerce();
    let variant = add_variant(&commerce, "VASE", 1200, 1).await;
    let placed = place_order(&commerce, &[(variant, 1)], PROVIDER_ORDER_ID).await;

    let authorized = commerce
        .mark_authorized(PROVIDER_ORDER_ID, PROVIDER_PAYMENT_ID, Some("deadbeef"))
        .await
        .unwrap();
    assert_eq!(
        authorized,
        ReconcileOutcome::Applied(PaymentStatus::Authorized)
    );

    // Authorization alone leaves the order pending and stock reserved.
    let order = commerce.get_order(&admin(), placed.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(
        commerce.stock_level(variant).await.unwrap(),
        StockLevel::new(1, 1)
    );

    let captured = commerce
        .reconcile(
            &EventKind::Captured,
            PROVIDER_ORDER_ID,
            PROVIDER_PAYMENT_ID,
            None,
        )
        .await
        .unwrap();
    assert_eq!(captured, ReconcileOutcome::Applied(PaymentStatus::Captured));
    assert_eq!(
        commerce.stock_level(variant).await.unwrap(),
        StockLevel::new(0, 0)
    );
}

#[tokio::test]
async fn test_unknown_provider_order_is_ignored() {
    let commerce = memory_commerce();
    let variant = add_variant(&commerce, "SPOON", 150, 4).await;
    place_order(&commerce, &[(variant, 1)], PROVIDER_ORDER_ID).await;

    let outcome = commerce
        .mark_captured("order_UNKNOWN", PROVIDER_PAYMENT_ID)
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::UnknownPayment);
    assert_eq!(
        commerce.stock_level(variant).await.unwrap(),
        StockLevel::new(4, 1)
    );
}

#[tokio::test]
async fn test_unhandled_event_kind_is_ignored() {
    let commerce = memory_commerce();
    let variant = add_variant(&commerce, "FORK", 150, 4).await;
    place_order(&commerce, &[(variant, 1)], PROVIDER_ORDER_ID).await;

    let outcome = commerce
        .reconcile(
            &EventKind::from("refund.processed"),
            PROVIDER_ORDER_ID,
            PROVIDER_PAYMENT_ID,
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Ignored);
    assert_eq!(
        commerce.stock_level(variant).await.unwrap(),
        StockLevel::new(4, 1)
    );
}
