//! Reconciliation core: the shared state-transition function behind both the
//! webhook path and the poll path.
//!
//! Whichever trigger observes a terminal provider status first performs the
//! side effects; every later invocation finds the order already terminal and
//! performs only the idempotent payment upsert. The compare-and-swap in
//! [`queries::transition_order`] is what serializes concurrent triggers onto
//! exactly one winner.

use crate::db::{queries, retry, AppState};
use crate::error::Result;
use crate::grants;
use crate::models::{OrderStatus, ProviderPaymentStatus, Transition, UpsertPayment};
use crate::payments::{PaymentMetadata, PaymentObject, PROVIDER_NAME};

/// A provider status report about one payment, as observed by either
/// trigger. Both paths normalize into this before calling [`reconcile`].
#[derive(Debug, Clone)]
pub struct PaymentReport {
    pub provider_payment_id: String,
    /// Raw provider status string (pending / waiting_for_capture /
    /// succeeded / canceled / anything future).
    pub status: String,
    pub paid: bool,
    pub amount: f64,
    pub currency: String,
    pub metadata: Option<PaymentMetadata>,
    /// Raw report payload, persisted on the payment row for audit.
    pub last_event: Option<String>,
}

impl PaymentReport {
    pub fn from_provider(object: &PaymentObject, last_event: Option<String>) -> Self {
        Self {
            provider_payment_id: object.id.clone(),
            status: object.status.clone(),
            paid: object.paid,
            amount: object.amount.parsed().unwrap_or(0.0),
            currency: object.amount.currency.clone(),
            metadata: object.metadata.clone(),
            last_event,
        }
    }

    /// Map the provider's vocabulary onto an order transition target.
    /// `None` means the report is non-terminal: the payment row is still
    /// updated but the order stays `pending_payment`.
    pub fn target_status(&self) -> Option<OrderStatus> {
        let parsed: Option<ProviderPaymentStatus> = self.status.parse().ok();
        if parsed == Some(ProviderPaymentStatus::Succeeded) || self.paid {
            Some(OrderStatus::Paid)
        } else if parsed == Some(ProviderPaymentStatus::Canceled) {
            Some(OrderStatus::Canceled)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// True when this invocation performed the order's terminal transition.
    pub order_updated: bool,
}

/// Converge local state with one provider report.
///
/// Database errors propagate to the caller: the webhook path absorbs them
/// (the poll path or a later redelivery converges instead), the poll path
/// surfaces them to the waiting client.
pub async fn reconcile(state: &AppState, report: &PaymentReport) -> Result<ReconcileOutcome> {
    // Resolve the order: trust the metadata we put on the charge, fall back
    // to the payment reference recorded at charge time.
    let order_id = match resolve_order_id(state, report).await? {
        Some(id) => id,
        None => {
            tracing::warn!(
                "No order resolvable for payment {}, skipping reconciliation",
                report.provider_payment_id
            );
            return Ok(ReconcileOutcome { order_updated: false });
        }
    };

    let order = match retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
        queries::get_order_by_id(conn, &order_id)
    })
    .await?
    {
        Some(order) => order,
        None => {
            tracing::warn!(
                "Payment {} references unknown order {}, skipping reconciliation",
                report.provider_payment_id,
                order_id
            );
            return Ok(ReconcileOutcome { order_updated: false });
        }
    };

    // Step 1: the payment row always reflects the latest report, terminal
    // or not. The (provider, provider_payment_id) upsert dedups repeats.
    let upsert = UpsertPayment {
        order_id: order.id.clone(),
        provider: PROVIDER_NAME.to_string(),
        provider_payment_id: report.provider_payment_id.clone(),
        status: report.status.clone(),
        amount: report.amount,
        currency: report.currency.clone(),
        last_event: report.last_event.clone(),
    };
    retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
        queries::upsert_payment(conn, &upsert)
    })
    .await?;

    let Some(target) = report.target_status() else {
        tracing::debug!(
            "Payment {} reported {}, order {} stays pending",
            report.provider_payment_id,
            report.status,
            order.id
        );
        return Ok(ReconcileOutcome { order_updated: false });
    };

    // Step 2: CAS transition; exactly one concurrent caller gets Applied.
    let transition = retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
        queries::transition_order(conn, &order.id, target, None)
    })
    .await?;

    match transition {
        Transition::Applied => {
            tracing::info!(
                "Order {} transitioned to {} (payment {})",
                order.id,
                target,
                report.provider_payment_id
            );

            // Step 3: paid-side effects, performed only by the winner.
            if target == OrderStatus::Paid {
                let purchase = grants::issue_purchase(state, &order).await?;
                grants::spawn_purchase_notification(state.clone(), order, purchase);
            }

            Ok(ReconcileOutcome { order_updated: true })
        }
        Transition::Noop => Ok(ReconcileOutcome { order_updated: false }),
        Transition::Conflict(current) => {
            tracing::warn!(
                "Refusing to move order {} from terminal {} to {} (payment {})",
                order.id,
                current,
                target,
                report.provider_payment_id
            );
            Ok(ReconcileOutcome { order_updated: false })
        }
    }
}

async fn resolve_order_id(state: &AppState, report: &PaymentReport) -> Result<Option<String>> {
    if let Some(order_id) = report.metadata.as_ref().and_then(|m| m.order_id.clone()) {
        return Ok(Some(order_id));
    }

    retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
        queries::get_order_id_for_provider_payment(conn, PROVIDER_NAME, &report.provider_payment_id)
    })
    .await
}
