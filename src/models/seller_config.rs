use serde::{Deserialize, Serialize};

/// Per-seller payment provider credentials. Orders whose seller has an
/// active config are charged through that seller's account; everything else
/// falls back to the platform credentials from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerConfig {
    pub id: String,
    pub seller_id: String,
    pub provider: String,
    pub shop_id: String,
    pub secret_key: String,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}
