//! Provider wire-format tests: payment object parsing, amount handling,
//! status mapping.

use soundpay::error::AppError;
use soundpay::models::OrderStatus;
use soundpay::payments::{PaymentApiError, PaymentObject, YooAmount};
use soundpay::reconcile::PaymentReport;

#[test]
fn test_parse_payment_object() {
    let raw = r#"{
        "id": "2419a771-000f-5000-9000-1edaf29243f2",
        "status": "succeeded",
        "paid": true,
        "amount": { "value": "500.00", "currency": "RUB" },
        "description": "The Harbor Lights - Night Drive",
        "metadata": {
            "orderId": "sp_ord_a1b2c3d4e5f6789012345678901234ab",
            "albumId": "sp_alb_000000000000000000000000000000aa",
            "customerEmail": "buyer@example.com"
        },
        "created_at": "2024-01-15T10:00:00.000Z",
        "captured_at": "2024-01-15T10:01:30.000Z",
        "refundable": true,
        "test": false
    }"#;

    let payment: PaymentObject = serde_json::from_str(raw).expect("should parse");
    assert_eq!(payment.id, "2419a771-000f-5000-9000-1edaf29243f2");
    assert_eq!(payment.status, "succeeded");
    assert!(payment.paid);
    assert_eq!(payment.amount.parsed(), Some(500.0));
    assert_eq!(payment.amount.currency, "RUB");
    assert_eq!(
        payment.metadata.as_ref().and_then(|m| m.order_id.as_deref()),
        Some("sp_ord_a1b2c3d4e5f6789012345678901234ab")
    );
    // Unknown provider fields must not break parsing.
}

#[test]
fn test_parse_pending_payment_with_confirmation() {
    let raw = r#"{
        "id": "2419a771-000f-5000-9000-1edaf29243f2",
        "status": "pending",
        "paid": false,
        "amount": { "value": "500.00", "currency": "RUB" },
        "confirmation": {
            "type": "redirect",
            "confirmation_url": "https://yoomoney.ru/checkout/payments?orderId=xyz"
        }
    }"#;

    let payment: PaymentObject = serde_json::from_str(raw).expect("should parse");
    assert_eq!(
        payment.confirmation_url(),
        Some("https://yoomoney.ru/checkout/payments?orderId=xyz")
    );
}

#[test]
fn test_parse_webhook_object_without_paid_flag() {
    // Some notification payloads omit `paid`; it must default to false.
    let raw = r#"{
        "id": "P1",
        "status": "waiting_for_capture",
        "amount": { "value": "500.00", "currency": "RUB" }
    }"#;

    let payment: PaymentObject = serde_json::from_str(raw).expect("should parse");
    assert!(!payment.paid);
    assert!(payment.metadata.is_none());
}

#[test]
fn test_amount_wire_format() {
    assert_eq!(YooAmount::from_value(500.0, "RUB").value, "500.00");
    assert_eq!(YooAmount::from_value(0.01, "RUB").value, "0.01");
    assert_eq!(YooAmount::from_value(1234.5, "RUB").value, "1234.50");

    assert_eq!(
        YooAmount {
            value: "500.00".to_string(),
            currency: "RUB".to_string()
        }
        .parsed(),
        Some(500.0)
    );
    assert_eq!(
        YooAmount {
            value: "garbage".to_string(),
            currency: "RUB".to_string()
        }
        .parsed(),
        None
    );
}

#[test]
fn test_status_mapping_to_order_target() {
    fn report_with(status: &str, paid: bool) -> PaymentReport {
        PaymentReport {
            provider_payment_id: "P1".to_string(),
            status: status.to_string(),
            paid,
            amount: 500.0,
            currency: "RUB".to_string(),
            metadata: None,
            last_event: None,
        }
    }

    assert_eq!(
        report_with("succeeded", false).target_status(),
        Some(OrderStatus::Paid)
    );
    // An explicit paid flag wins even when the status string lags behind.
    assert_eq!(
        report_with("waiting_for_capture", true).target_status(),
        Some(OrderStatus::Paid)
    );
    assert_eq!(
        report_with("canceled", false).target_status(),
        Some(OrderStatus::Canceled)
    );
    assert_eq!(report_with("pending", false).target_status(), None);
    assert_eq!(report_with("waiting_for_capture", false).target_status(), None);
    assert_eq!(report_with("some_future_status", false).target_status(), None);
}

#[test]
fn test_provider_error_maps_to_user_facing_error() {
    let err: AppError = PaymentApiError::Provider {
        code: "invalid_request".to_string(),
        description: "Invalid phone format".to_string(),
    }
    .into();
    assert!(matches!(err, AppError::Provider { ref code, .. } if code == "invalid_request"));

    let err: AppError = PaymentApiError::Network("connect timeout".to_string()).into();
    assert!(matches!(err, AppError::Unavailable(_)));
}
