use serde::{Deserialize, Serialize};

/// The artifact that grants a buyer download access once an order is paid.
///
/// Uniqueness on (customer_email, album_id): a buyer purchasing the same
/// album twice converges onto the same purchase and token. The token never
/// changes once issued - it may already be in an email or a bookmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: String,
    /// The most recent order that paid for this purchase.
    pub order_id: String,
    pub customer_email: String,
    pub album_id: String,
    pub purchase_token: String,
    pub download_count: i64,
    pub last_downloaded_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}
