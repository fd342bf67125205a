use serde::{Deserialize, Serialize};

/// Read model of the storefront catalog. The catalog is owned elsewhere;
/// this service only reads what the charge description and the confirmation
/// email need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub album_id: String,
    pub title: String,
    pub position: i64,
}
