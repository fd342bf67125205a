//! Webhook ingestion for provider push notifications.
//!
//! The ingestor always acknowledges with `200 {success, message}`: the
//! provider treats any non-2xx as "redeliver forever", and an internal
//! processing failure is better handled by our own reconciliation paths (the
//! next poll, or the provider's periodic status re-push) than by blind
//! redelivery. Only a transport-level malformed body gets a 4xx.

mod yookassa;

pub use yookassa::*;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use serde::Serialize;

use crate::db::{queries, retry, AppState};
use crate::extractors::Json;
use crate::payments::{PaymentObject, PROVIDER_NAME};
use crate::reconcile::{self, PaymentReport};

pub fn router() -> Router<AppState> {
    Router::new().route("/payment/webhook", post(handle_payment_webhook))
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
}

fn ack(success: bool, message: &str) -> (StatusCode, Json<WebhookAck>) {
    (
        StatusCode::OK,
        Json(WebhookAck {
            success,
            message: message.to_string(),
        }),
    )
}

/// POST /payment/webhook - provider push notifications, at-least-once.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!("Malformed webhook body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(WebhookAck {
                    success: false,
                    message: "Invalid JSON".to_string(),
                }),
            );
        }
    };

    tracing::info!(
        "Payment webhook received: type={}, event={}",
        envelope.kind,
        envelope.event
    );

    if envelope.kind != "notification" {
        tracing::warn!("Unknown webhook type: {}", envelope.kind);
        return ack(true, "Webhook type not processed");
    }
    if !envelope.event.starts_with("payment.") {
        tracing::debug!("Unhandled event: {}", envelope.event);
        return ack(true, "Webhook received");
    }

    let object: PaymentObject = match serde_json::from_value(envelope.object.clone()) {
        Ok(object) => object,
        Err(e) => {
            // Processing error, not transport error: acknowledge so the
            // provider does not redeliver an object we cannot parse anyway.
            tracing::error!("Failed to parse payment object: {}", e);
            return ack(false, "Invalid payment object");
        }
    };

    // Stable event identity from (event type, payment id) - never from the
    // payload bytes, which transports may re-serialize in any field order.
    let event_id = format!("{}:{}", envelope.event, object.id);

    let first_sight = retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
        queries::try_record_webhook_event(conn, PROVIDER_NAME, &event_id, &envelope.event, &object.id)
    })
    .await;

    match first_sight {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!("Duplicate webhook delivery for {}, ignoring", event_id);
            return ack(true, "Already processed");
        }
        Err(e) => {
            tracing::error!("Failed to record webhook event {}: {}", event_id, e);
            return ack(false, "Event not recorded");
        }
    }

    let report = PaymentReport::from_provider(&object, Some(envelope.object.to_string()));
    match reconcile::reconcile(&state, &report).await {
        Ok(outcome) => {
            tracing::info!(
                "Webhook {} reconciled: payment={}, status={}, order_updated={}",
                envelope.event,
                object.id,
                object.status,
                outcome.order_updated
            );
            ack(true, "Payment processed")
        }
        Err(e) => {
            // Absorbed: the poll path or a later status push converges.
            tracing::error!(
                "Webhook processing failed for payment {} (left to reconciliation): {}",
                object.id,
                e
            );
            ack(false, "Processing failed")
        }
    }
}
