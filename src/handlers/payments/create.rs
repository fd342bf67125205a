use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{queries, retry, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::Json;
use crate::id;
use crate::models::{CreateOrder, Order, OrderStatus, UpsertPayment};
use crate::payments::{CreateChargeArgs, YooKassaClient, PROVIDER_NAME};

use super::resolve_credentials;

/// Minimum chargeable amount (one minor currency unit).
pub const MIN_AMOUNT: f64 = 0.01;

/// Half a minor unit: amounts further apart than this are a repricing, not
/// rounding noise.
pub const AMOUNT_EPSILON: f64 = 0.005;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingData {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub amount: f64,
    /// ISO currency code; defaults to RUB.
    #[serde(default)]
    pub currency: Option<String>,
    /// Charge description; defaults to "Artist - Album".
    #[serde(default)]
    pub description: Option<String>,
    pub album_id: String,
    pub customer_email: String,
    /// Existing order id when the buyer retries a failed payment.
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub seller_id: Option<String>,
    /// Post-confirmation redirect; defaults to the storefront success page.
    #[serde(default)]
    pub return_url: Option<String>,
    #[serde(default)]
    pub billing: Option<BillingData>,
}

/// Check that an existing order can accept another charge attempt.
///
/// The stored order is authoritative: a request that reprices it beyond the
/// currency epsilon is rejected rather than silently honored, and terminal
/// orders take no further charges at all.
pub fn validate_order_reuse(order: &Order, requested_amount: f64) -> Result<()> {
    match order.status {
        OrderStatus::Paid => Err(AppError::AlreadyPaid),
        OrderStatus::Canceled => Err(AppError::Conflict(msg::ORDER_CANCELED.to_string())),
        OrderStatus::PendingPayment => {
            if (order.amount - requested_amount).abs() > AMOUNT_EPSILON {
                Err(AppError::AmountMismatch {
                    requested: requested_amount,
                    stored: order.amount,
                })
            } else {
                Ok(())
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub success: bool,
    pub payment_id: String,
    pub confirmation_url: String,
    pub order_id: String,
}

/// POST /payment/create - create (or reuse) an order and delegate a charge
/// to the provider.
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>> {
    if request.amount < MIN_AMOUNT {
        return Err(AppError::BadRequest(msg::AMOUNT_TOO_SMALL.to_string()));
    }
    let email = request.customer_email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest(msg::MISSING_CUSTOMER_EMAIL.to_string()));
    }
    if let Some(order_id) = &request.order_id {
        if !id::is_valid_prefixed_id(order_id) {
            return Err(AppError::BadRequest(msg::INVALID_ORDER_ID.to_string()));
        }
    }

    let currency = request
        .currency
        .clone()
        .unwrap_or_else(|| "RUB".to_string());

    let album = retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
        queries::get_album_by_id(conn, &request.album_id)
    })
    .await?
    .or_not_found(msg::ALBUM_NOT_FOUND)?;

    let order = match &request.order_id {
        Some(existing_id) => {
            // Buyer retrying a failed payment: the stored order is
            // authoritative, not the request body.
            let order = retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
                queries::get_order_by_id(conn, existing_id)
            })
            .await?
            .or_not_found(msg::ORDER_NOT_FOUND)?;

            validate_order_reuse(&order, request.amount)?;

            order
        }
        None => {
            let input = CreateOrder {
                album_id: request.album_id.clone(),
                customer_email: email.to_string(),
                billing_name: request
                    .billing
                    .as_ref()
                    .map(|b| format!("{} {}", b.first_name, b.last_name)),
                billing_phone: request.billing.as_ref().and_then(|b| b.phone.clone()),
                amount: request.amount,
                currency: currency.clone(),
                seller_id: request.seller_id.clone(),
            };
            retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
                queries::create_order(conn, &input)
            })
            .await?
        }
    };

    let credentials = resolve_credentials(&state, order.seller_id.as_deref()).await?;
    let client = YooKassaClient::new(state.http.clone(), &state.provider_api_url, &credentials);

    let description = request
        .description
        .clone()
        .unwrap_or_else(|| format!("{} - {}", album.artist, album.title));
    let return_url = request
        .return_url
        .clone()
        .unwrap_or_else(|| format!("{}/?payment=success", state.site_url));

    // Fixed for every connect-level retry inside this call, so the provider
    // recognizes them as one logical charge. A later checkout attempt for
    // the same order gets a fresh suffix and therefore a fresh charge.
    let idempotence_key = format!("{}-{}", order.id, Utc::now().timestamp_millis());

    let payment = client
        .create_payment(
            &CreateChargeArgs {
                order: &order,
                description: &description,
                return_url: &return_url,
            },
            &idempotence_key,
        )
        .await
        .map_err(AppError::from)?;

    // The charge must carry exactly the order's amount.
    match payment.amount.parsed() {
        Some(confirmed) if (confirmed - order.amount).abs() <= AMOUNT_EPSILON => {}
        _ => {
            return Err(AppError::Internal(format!(
                "Provider confirmed amount {} does not match order amount {:.2}",
                payment.amount.value, order.amount
            )))
        }
    }

    let confirmation_url = payment
        .confirmation_url()
        .map(str::to_string)
        .ok_or_else(|| AppError::Internal("Provider response missing confirmation URL".to_string()))?;

    let upsert = UpsertPayment {
        order_id: order.id.clone(),
        provider: PROVIDER_NAME.to_string(),
        provider_payment_id: payment.id.clone(),
        status: payment.status.clone(),
        amount: payment.amount.parsed().unwrap_or(order.amount),
        currency: payment.amount.currency.clone(),
        last_event: serde_json::to_string(&payment).ok(),
    };

    retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
        queries::attach_payment(conn, &order.id, &payment.id)?;
        queries::upsert_payment(conn, &upsert)?;
        Ok(())
    })
    .await?;

    tracing::info!(
        "Charge created: order={}, payment={}, amount={:.2} {}",
        order.id,
        payment.id,
        order.amount,
        order.currency
    );

    Ok(Json(CreatePaymentResponse {
        success: true,
        payment_id: payment.id,
        confirmation_url,
        order_id: order.id,
    }))
}
