use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{msg, AppError, Result};
use crate::id::{gen_purchase_token, EntityType};
use crate::models::*;

use super::from_row::{
    query_all, query_one, FromRow, ALBUM_COLS, ORDER_COLS, PAYMENT_COLS, PURCHASE_COLS,
    SELLER_CONFIG_COLS, TRACK_COLS, WEBHOOK_EVENT_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Orders ============

pub fn create_order(conn: &Connection, input: &CreateOrder) -> Result<Order> {
    let id = EntityType::Order.gen_id();
    let ts = now();

    conn.execute(
        "INSERT INTO orders (id, album_id, customer_email, billing_name, billing_phone,
                             amount, currency, status, seller_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending_payment', ?8, ?9, ?9)",
        params![
            id,
            input.album_id,
            input.customer_email,
            input.billing_name,
            input.billing_phone,
            input.amount,
            input.currency,
            input.seller_id,
            ts,
        ],
    )?;

    Ok(Order {
        id,
        album_id: input.album_id.clone(),
        customer_email: input.customer_email.clone(),
        billing_name: input.billing_name.clone(),
        billing_phone: input.billing_phone.clone(),
        amount: input.amount,
        currency: input.currency.clone(),
        status: OrderStatus::PendingPayment,
        seller_id: input.seller_id.clone(),
        payment_id: None,
        paid_at: None,
        created_at: ts,
        updated_at: ts,
    })
}

pub fn get_order_by_id(conn: &Connection, id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        &[&id],
    )
}

/// Record the provider payment reference on the order once a charge exists.
pub fn attach_payment(conn: &Connection, order_id: &str, provider_payment_id: &str) -> Result<()> {
    let affected = conn.execute(
        "UPDATE orders SET payment_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![provider_payment_id, now(), order_id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound(msg::ORDER_NOT_FOUND.to_string()));
    }
    Ok(())
}

/// Compare-and-swap transition from `pending_payment` into a terminal state.
///
/// The `WHERE status = 'pending_payment'` guard is the serialization point:
/// of any number of concurrent callers exactly one observes `Applied` and is
/// responsible for the paid-side effects. A caller re-targeting the current
/// state gets `Noop`; a caller targeting the opposite terminal state gets
/// `Conflict` and must not flip it.
pub fn transition_order(
    conn: &Connection,
    order_id: &str,
    target: OrderStatus,
    paid_at: Option<i64>,
) -> Result<Transition> {
    debug_assert!(target.is_terminal(), "transition target must be terminal");
    let ts = now();

    let affected = conn.execute(
        "UPDATE orders
         SET status = ?1,
             paid_at = CASE WHEN ?1 = 'paid' THEN COALESCE(?2, ?3) ELSE paid_at END,
             updated_at = ?3
         WHERE id = ?4 AND status = 'pending_payment'",
        params![target.as_str(), paid_at, ts, order_id],
    )?;
    if affected > 0 {
        return Ok(Transition::Applied);
    }

    let order = get_order_by_id(conn, order_id)?
        .ok_or_else(|| AppError::NotFound(msg::ORDER_NOT_FOUND.to_string()))?;
    if order.status == target {
        Ok(Transition::Noop)
    } else {
        Ok(Transition::Conflict(order.status))
    }
}

// ============ Payments ============

/// Upsert a payment row by its (provider, provider_payment_id) identity.
///
/// Repeated status reports about the same charge land on one row; the last
/// writer's status fields win (the provider reports status monotonically, so
/// last-write-wins is safe). The original order association is kept.
pub fn upsert_payment(conn: &Connection, input: &UpsertPayment) -> Result<Payment> {
    let id = EntityType::Payment.gen_id();
    let ts = now();

    conn.query_row(
        &format!(
            "INSERT INTO payments (id, order_id, provider, provider_payment_id, status,
                                   amount, currency, last_event, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT(provider, provider_payment_id) DO UPDATE SET
                 status = excluded.status,
                 amount = excluded.amount,
                 currency = excluded.currency,
                 last_event = excluded.last_event,
                 updated_at = excluded.updated_at
             RETURNING {}",
            PAYMENT_COLS
        ),
        params![
            id,
            input.order_id,
            input.provider,
            input.provider_payment_id,
            input.status,
            input.amount,
            input.currency,
            input.last_event,
            ts,
        ],
        Payment::from_row,
    )
    .map_err(Into::into)
}

pub fn get_payment_by_provider_id(
    conn: &Connection,
    provider: &str,
    provider_payment_id: &str,
) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE provider = ?1 AND provider_payment_id = ?2",
            PAYMENT_COLS
        ),
        &[&provider, &provider_payment_id],
    )
}

/// Resolve the order a provider payment id belongs to, preferring the
/// payments row recorded at charge time over the reference stored on the
/// order itself.
pub fn get_order_id_for_provider_payment(
    conn: &Connection,
    provider: &str,
    provider_payment_id: &str,
) -> Result<Option<String>> {
    if let Some(payment) = get_payment_by_provider_id(conn, provider, provider_payment_id)? {
        return Ok(Some(payment.order_id));
    }
    conn.query_row(
        "SELECT id FROM orders WHERE payment_id = ?1",
        params![provider_payment_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

// ============ Webhook Event Ledger ============

/// Atomically record a webhook event, returning true if this is the first
/// sight of it.
///
/// Uses INSERT OR IGNORE for atomicity - if the (provider, event_id) pair
/// already exists, the insert is silently ignored and we return false.
pub fn try_record_webhook_event(
    conn: &Connection,
    provider: &str,
    event_id: &str,
    event_type: &str,
    payment_id: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (provider, event_id, event_type, payment_id, received_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![provider, event_id, event_type, payment_id, now()],
    )?;
    Ok(affected > 0)
}

pub fn list_webhook_events_for_payment(
    conn: &Connection,
    provider: &str,
    payment_id: &str,
) -> Result<Vec<WebhookEvent>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM webhook_events
             WHERE provider = ?1 AND payment_id = ?2
             ORDER BY received_at",
            WEBHOOK_EVENT_COLS
        ),
        &[&provider, &payment_id],
    )
}

pub fn count_webhook_events(conn: &Connection, provider: &str, payment_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM webhook_events WHERE provider = ?1 AND payment_id = ?2",
        params![provider, payment_id],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

// ============ Purchases ============

/// Upsert the download grant for a paid order, keyed by
/// (customer_email, album_id).
///
/// A fresh token is generated only when the row is first inserted; on
/// conflict the existing token is preserved (it may already be in an email
/// or a bookmark) and only the order association moves to the current order.
pub fn upsert_purchase(conn: &Connection, order: &Order) -> Result<Purchase> {
    let id = EntityType::Purchase.gen_id();
    let token = gen_purchase_token();
    let ts = now();

    conn.query_row(
        &format!(
            "INSERT INTO purchases (id, order_id, customer_email, album_id, purchase_token,
                                    download_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
             ON CONFLICT(customer_email, album_id) DO UPDATE SET
                 order_id = excluded.order_id,
                 updated_at = excluded.updated_at
             RETURNING {}",
            PURCHASE_COLS
        ),
        params![id, order.id, order.customer_email, order.album_id, token, ts],
        Purchase::from_row,
    )
    .map_err(Into::into)
}

pub fn get_purchase_for_buyer(
    conn: &Connection,
    customer_email: &str,
    album_id: &str,
) -> Result<Option<Purchase>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM purchases WHERE customer_email = ?1 AND album_id = ?2",
            PURCHASE_COLS
        ),
        &[&customer_email, &album_id],
    )
}

pub fn get_purchase_by_token(conn: &Connection, token: &str) -> Result<Option<Purchase>> {
    query_one(
        conn,
        &format!("SELECT {} FROM purchases WHERE purchase_token = ?1", PURCHASE_COLS),
        &[&token],
    )
}

// ============ Catalog (read model) ============

pub fn get_album_by_id(conn: &Connection, id: &str) -> Result<Option<Album>> {
    query_one(
        conn,
        &format!("SELECT {} FROM albums WHERE id = ?1", ALBUM_COLS),
        &[&id],
    )
}

pub fn list_album_tracks(conn: &Connection, album_id: &str) -> Result<Vec<Track>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM tracks WHERE album_id = ?1 ORDER BY position",
            TRACK_COLS
        ),
        &[&album_id],
    )
}

/// Insert a catalog album. Dev seeding and tests only - the catalog is
/// owned by the storefront.
pub fn insert_album(conn: &Connection, id: &str, title: &str, artist: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO albums (id, title, artist, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, title, artist, now()],
    )?;
    Ok(())
}

/// Insert a catalog track. Dev seeding and tests only.
pub fn insert_track(
    conn: &Connection,
    album_id: &str,
    title: &str,
    position: i64,
) -> Result<String> {
    let id = EntityType::Track.gen_id();
    conn.execute(
        "INSERT INTO tracks (id, album_id, title, position) VALUES (?1, ?2, ?3, ?4)",
        params![id, album_id, title, position],
    )?;
    Ok(id)
}

// ============ Seller payment configs ============

pub fn get_active_seller_config(
    conn: &Connection,
    seller_id: &str,
    provider: &str,
) -> Result<Option<SellerConfig>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM seller_configs
             WHERE seller_id = ?1 AND provider = ?2 AND active = 1",
            SELLER_CONFIG_COLS
        ),
        &[&seller_id, &provider],
    )
}

pub fn upsert_seller_config(
    conn: &Connection,
    seller_id: &str,
    provider: &str,
    shop_id: &str,
    secret_key: &str,
) -> Result<()> {
    let id = EntityType::SellerConfig.gen_id();
    let ts = now();
    conn.execute(
        "INSERT INTO seller_configs (id, seller_id, provider, shop_id, secret_key, active,
                                     created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
         ON CONFLICT(seller_id, provider) DO UPDATE SET
             shop_id = excluded.shop_id,
             secret_key = excluded.secret_key,
             active = 1,
             updated_at = excluded.updated_at",
        params![id, seller_id, provider, shop_id, secret_key, ts],
    )?;
    Ok(())
}
