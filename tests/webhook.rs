//! Webhook ingestor tests: envelope handling, ledger dedup, idempotent
//! delivery.

mod common;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use common::*;
use serde_json::json;
use soundpay::handlers::webhooks::handle_payment_webhook;

fn succeeded_envelope(payment_id: &str, order_id: &str) -> Vec<u8> {
    json!({
        "type": "notification",
        "event": "payment.succeeded",
        "object": {
            "id": payment_id,
            "status": "succeeded",
            "paid": true,
            "amount": { "value": "500.00", "currency": "RUB" },
            "metadata": { "orderId": order_id },
            "created_at": "2024-01-15T10:00:00.000Z"
        }
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn test_duplicate_delivery_is_processed_once() {
    let app = setup_test_app("webhook_duplicate");
    let conn = app.state.db.get().unwrap();
    let album = create_test_album(&conn);
    let order = create_test_order(&conn, &album, "buyer@example.com", 500.0);
    drop(conn);

    let body = succeeded_envelope("P1", &order.id);

    // Two back-to-back deliveries of the identical envelope.
    let (status1, ack1) =
        handle_payment_webhook(State(app.state.clone()), Bytes::from(body.clone())).await;
    let (status2, ack2) =
        handle_payment_webhook(State(app.state.clone()), Bytes::from(body)).await;

    assert_eq!(status1, StatusCode::OK);
    assert_eq!(status2, StatusCode::OK);
    assert!(ack1.0.success);
    assert!(ack2.0.success);
    assert_eq!(ack2.0.message, "Already processed");

    let conn = app.state.db.get().unwrap();

    // One ledger row for the event id, order paid exactly once, one
    // purchase with a non-empty token.
    let events = queries::list_webhook_events_for_payment(&conn, "yookassa", "P1").unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "payment.succeeded");
    assert_eq!(events[0].payment_id, "P1");
    assert_eq!(events[0].event_id, "payment.succeeded:P1");

    let order = queries::get_order_by_id(&conn, &order.id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);

    let purchases: i64 = conn
        .query_row("SELECT COUNT(*) FROM purchases", [], |row| row.get(0))
        .unwrap();
    assert_eq!(purchases, 1);
    let purchase = queries::get_purchase_for_buyer(&conn, "buyer@example.com", &album)
        .unwrap()
        .unwrap();
    assert!(!purchase.purchase_token.is_empty());
}

#[tokio::test]
async fn test_distinct_events_for_same_payment_are_both_recorded() {
    let app = setup_test_app("webhook_distinct_events");
    let conn = app.state.db.get().unwrap();
    let album = create_test_album(&conn);
    let order = create_test_order(&conn, &album, "buyer@example.com", 500.0);
    drop(conn);

    let capture = json!({
        "type": "notification",
        "event": "payment.waiting_for_capture",
        "object": {
            "id": "P1",
            "status": "waiting_for_capture",
            "paid": false,
            "amount": { "value": "500.00", "currency": "RUB" },
            "metadata": { "orderId": order.id }
        }
    })
    .to_string();

    handle_payment_webhook(State(app.state.clone()), Bytes::from(capture)).await;
    handle_payment_webhook(
        State(app.state.clone()),
        Bytes::from(succeeded_envelope("P1", &order.id)),
    )
    .await;

    let conn = app.state.db.get().unwrap();
    // Distinct event types carry distinct event ids.
    assert_eq!(queries::count_webhook_events(&conn, "yookassa", "P1").unwrap(), 2);

    let order = queries::get_order_by_id(&conn, &order.id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_canceled_event_cancels_order() {
    let app = setup_test_app("webhook_canceled");
    let conn = app.state.db.get().unwrap();
    let album = create_test_album(&conn);
    let order = create_test_order(&conn, &album, "buyer@example.com", 500.0);
    drop(conn);

    let body = json!({
        "type": "notification",
        "event": "payment.canceled",
        "object": {
            "id": "P1",
            "status": "canceled",
            "paid": false,
            "amount": { "value": "500.00", "currency": "RUB" },
            "metadata": { "orderId": order.id },
            "cancellation_details": { "party": "yoo_money", "reason": "expired_on_confirmation" }
        }
    })
    .to_string();

    let (status, ack) = handle_payment_webhook(State(app.state.clone()), Bytes::from(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(ack.0.success);

    let conn = app.state.db.get().unwrap();
    let order = queries::get_order_by_id(&conn, &order.id).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Canceled);
    assert!(queries::get_purchase_for_buyer(&conn, "buyer@example.com", &album)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_non_notification_type_is_acknowledged_and_ignored() {
    let app = setup_test_app("webhook_unknown_type");

    let body = json!({
        "type": "something_else",
        "event": "payment.succeeded",
        "object": {}
    })
    .to_string();

    let (status, ack) = handle_payment_webhook(State(app.state.clone()), Bytes::from(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(ack.0.success);
    assert_eq!(ack.0.message, "Webhook type not processed");

    let conn = app.state.db.get().unwrap();
    let events: i64 = conn
        .query_row("SELECT COUNT(*) FROM webhook_events", [], |row| row.get(0))
        .unwrap();
    assert_eq!(events, 0);
}

#[tokio::test]
async fn test_unhandled_event_is_acknowledged() {
    let app = setup_test_app("webhook_unhandled_event");

    let body = json!({
        "type": "notification",
        "event": "refund.succeeded",
        "object": { "id": "R1" }
    })
    .to_string();

    let (status, ack) = handle_payment_webhook(State(app.state.clone()), Bytes::from(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(ack.0.success);
}

#[tokio::test]
async fn test_malformed_body_is_a_transport_error() {
    let app = setup_test_app("webhook_malformed");

    let (status, ack) =
        handle_payment_webhook(State(app.state.clone()), Bytes::from_static(b"not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!ack.0.success);
}

#[tokio::test]
async fn test_internal_failure_still_acknowledges_200() {
    let app = setup_test_app("webhook_internal_failure");
    // No album/order in the database: reconciliation cannot resolve the
    // order, but the provider must still get its 200.
    let body = json!({
        "type": "notification",
        "event": "payment.succeeded",
        "object": {
            "id": "P-orphan",
            "status": "succeeded",
            "paid": true,
            "amount": { "value": "500.00", "currency": "RUB" }
        }
    })
    .to_string();

    let (status, _ack) = handle_payment_webhook(State(app.state.clone()), Bytes::from(body)).await;
    assert_eq!(status, StatusCode::OK);
}
