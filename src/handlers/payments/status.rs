use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{queries, retry, AppState};
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Json, Query};
use crate::id;
use crate::models::ProviderPaymentStatus;
use crate::payments::{
    CancellationDetails, PaymentApiError, PaymentMetadata, YooAmount, YooKassaClient,
    PROVIDER_NAME,
};
use crate::reconcile::{self, PaymentReport};

use super::resolve_credentials;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub id: String,
    pub status: String,
    pub paid: bool,
    pub amount: YooAmount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_details: Option<CancellationDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PaymentMetadata>,
    /// Present only while the payment can still be completed, so the buyer
    /// can be sent back to the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub success: bool,
    pub payment: PaymentInfo,
    pub order_updated: bool,
}

/// GET /payment/status?paymentId=|orderId= - the post-redirect poll.
///
/// Always asks the provider for the live status instead of trusting the
/// database, then reconciles local state with the answer. Unlike the
/// webhook path, errors here do surface: a human is waiting and will retry.
pub async fn payment_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<PaymentStatusResponse>> {
    let (provider_payment_id, seller_id) = resolve_target(&state, &query).await?;

    let credentials = resolve_credentials(&state, seller_id.as_deref()).await?;
    let client = YooKassaClient::new(state.http.clone(), &state.provider_api_url, &credentials);

    let payment = match client.fetch_payment(&provider_payment_id).await {
        Ok(payment) => payment,
        Err(PaymentApiError::Provider { code, .. }) if code == "not_found" => {
            return Err(AppError::NotFound("Payment not found".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let report = PaymentReport::from_provider(&payment, serde_json::to_string(&payment).ok());
    let outcome = reconcile::reconcile(&state, &report).await?;

    let resumable = matches!(
        payment.status.parse::<ProviderPaymentStatus>(),
        Ok(ProviderPaymentStatus::Pending) | Ok(ProviderPaymentStatus::WaitingForCapture)
    );
    let confirmation_url = if resumable {
        payment.confirmation_url().map(str::to_string)
    } else {
        None
    };

    Ok(Json(PaymentStatusResponse {
        success: true,
        payment: PaymentInfo {
            id: payment.id,
            status: payment.status,
            paid: payment.paid,
            amount: payment.amount,
            cancellation_details: payment.cancellation_details,
            metadata: payment.metadata,
            confirmation_url,
        },
        order_updated: outcome.order_updated,
    }))
}

/// Validate the query and resolve it to a provider payment id plus the
/// seller whose credentials should be used.
async fn resolve_target(
    state: &AppState,
    query: &StatusQuery,
) -> Result<(String, Option<String>)> {
    match (&query.payment_id, &query.order_id) {
        (None, None) => Err(AppError::BadRequest(
            msg::MISSING_PAYMENT_OR_ORDER_ID.to_string(),
        )),
        (Some(_), Some(_)) => Err(AppError::BadRequest(
            msg::AMBIGUOUS_PAYMENT_AND_ORDER_ID.to_string(),
        )),
        (None, Some(order_id)) => {
            if !id::is_valid_prefixed_id(order_id) {
                return Err(AppError::BadRequest(msg::INVALID_ORDER_ID.to_string()));
            }
            let order = retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
                queries::get_order_by_id(conn, order_id)
            })
            .await?
            .or_not_found(msg::ORDER_NOT_FOUND)?;

            let payment_id = order.payment_id.ok_or_else(|| {
                AppError::BadRequest(msg::ORDER_HAS_NO_PAYMENT.to_string())
            })?;
            Ok((payment_id, order.seller_id))
        }
        (Some(payment_id), None) => {
            if !id::is_valid_provider_payment_id(payment_id) {
                return Err(AppError::BadRequest(msg::INVALID_PAYMENT_ID.to_string()));
            }
            // Find the owning order (if we know it) for credential lookup.
            let order_id = retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
                queries::get_order_id_for_provider_payment(conn, PROVIDER_NAME, payment_id)
            })
            .await?;

            let seller_id = match order_id {
                Some(order_id) => {
                    retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
                        queries::get_order_by_id(conn, &order_id)
                    })
                    .await?
                    .and_then(|o| o.seller_id)
                }
                None => None,
            };
            Ok((payment_id.clone(), seller_id))
        }
    }
}
