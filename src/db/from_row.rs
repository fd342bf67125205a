//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! This module provides a `FromRow` trait that models can implement to
//! define how they are constructed from database rows, plus helper functions
//! for common query patterns.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on invalid database content.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
///
/// Implementing this trait allows using the `query_one` and `query_all`
/// helper functions, reducing repetitive row mapping closures.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const ORDER_COLS: &str = "id, album_id, customer_email, billing_name, billing_phone, amount, currency, status, seller_id, payment_id, paid_at, created_at, updated_at";

pub const PAYMENT_COLS: &str = "id, order_id, provider, provider_payment_id, status, amount, currency, last_event, created_at, updated_at";

pub const WEBHOOK_EVENT_COLS: &str = "provider, event_id, event_type, payment_id, received_at";

pub const PURCHASE_COLS: &str = "id, order_id, customer_email, album_id, purchase_token, download_count, last_downloaded_at, created_at, updated_at";

pub const ALBUM_COLS: &str = "id, title, artist, created_at";

pub const TRACK_COLS: &str = "id, album_id, title, position";

pub const SELLER_CONFIG_COLS: &str =
    "id, seller_id, provider, shop_id, secret_key, active, created_at, updated_at";

// ============ FromRow Implementations ============

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            album_id: row.get(1)?,
            customer_email: row.get(2)?,
            billing_name: row.get(3)?,
            billing_phone: row.get(4)?,
            amount: row.get(5)?,
            currency: row.get(6)?,
            status: parse_enum(row, 7, "status")?,
            seller_id: row.get(8)?,
            payment_id: row.get(9)?,
            paid_at: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Payment {
            id: row.get(0)?,
            order_id: row.get(1)?,
            provider: row.get(2)?,
            provider_payment_id: row.get(3)?,
            status: row.get(4)?,
            amount: row.get(5)?,
            currency: row.get(6)?,
            last_event: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for WebhookEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(WebhookEvent {
            provider: row.get(0)?,
            event_id: row.get(1)?,
            event_type: row.get(2)?,
            payment_id: row.get(3)?,
            received_at: row.get(4)?,
        })
    }
}

impl FromRow for Purchase {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Purchase {
            id: row.get(0)?,
            order_id: row.get(1)?,
            customer_email: row.get(2)?,
            album_id: row.get(3)?,
            purchase_token: row.get(4)?,
            download_count: row.get(5)?,
            last_downloaded_at: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for Album {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Album {
            id: row.get(0)?,
            title: row.get(1)?,
            artist: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl FromRow for Track {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Track {
            id: row.get(0)?,
            album_id: row.get(1)?,
            title: row.get(2)?,
            position: row.get(3)?,
        })
    }
}

impl FromRow for SellerConfig {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SellerConfig {
            id: row.get(0)?,
            seller_id: row.get(1)?,
            provider: row.get(2)?,
            shop_id: row.get(3)?,
            secret_key: row.get(4)?,
            active: row.get::<_, i64>(5)? != 0,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}
