//! Purchase/grant issuing for paid orders.
//!
//! The purchase row is the artifact that proves a buyer paid and carries
//! their download token. Issuing is a single idempotent upsert keyed by
//! (customer_email, album_id): a buyer whose earlier order already produced
//! a purchase keeps the token they were emailed, and only the order
//! association moves.
//!
//! The confirmation email is dispatched onto a detached task, decoupled from
//! the request/response lifecycle. It is attempted at most once per issued
//! grant and its failure never rolls back the purchase or the order.

use crate::db::{queries, retry, AppState};
use crate::email::{EmailSendResult, PurchaseEmailArgs};
use crate::error::Result;
use crate::models::{Order, Purchase};

/// Idempotently create (or re-associate) the purchase for a paid order.
pub async fn issue_purchase(state: &AppState, order: &Order) -> Result<Purchase> {
    let purchase = retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
        queries::upsert_purchase(conn, order)
    })
    .await?;

    tracing::info!(
        "Purchase issued: order={}, purchase={}, album={}, buyer={}",
        order.id,
        purchase.id,
        order.album_id,
        order.customer_email
    );

    Ok(purchase)
}

/// Fire-and-forget confirmation email (album name, artist, track list,
/// download token). Failures are logged and not retried here - notification
/// delivery is the email collaborator's concern.
pub fn spawn_purchase_notification(state: AppState, order: Order, purchase: Purchase) {
    tokio::spawn(async move {
        let loaded = retry::with_retry(&state.db, retry::DEFAULT_MAX_RETRIES, |conn| {
            let album = queries::get_album_by_id(conn, &order.album_id)?;
            let tracks = queries::list_album_tracks(conn, &order.album_id)?;
            Ok((album, tracks))
        })
        .await;

        let (album, tracks) = match loaded {
            Ok((Some(album), tracks)) => (album, tracks),
            Ok((None, _)) => {
                tracing::warn!(
                    "Album {} not found, skipping confirmation email for order {}",
                    order.album_id,
                    order.id
                );
                return;
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load album data for order {}, skipping confirmation email: {}",
                    order.id,
                    e
                );
                return;
            }
        };

        let args = PurchaseEmailArgs {
            to_email: &order.customer_email,
            customer_name: order.billing_name.as_deref(),
            order_id: &order.id,
            purchase_token: &purchase.purchase_token,
            album: &album,
            tracks: &tracks,
        };

        match state.email.send_purchase_email(&args).await {
            Ok(EmailSendResult::Sent) => {
                tracing::info!(
                    "Purchase confirmation sent: order={}, to={}",
                    order.id,
                    order.customer_email
                );
            }
            Ok(EmailSendResult::Disabled) => {}
            Err(e) => {
                tracing::warn!(
                    "Purchase confirmation failed for order {} (not retried): {}",
                    order.id,
                    e
                );
            }
        }
    });
}
