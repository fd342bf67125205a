use serde::{Deserialize, Serialize};

/// Ledger row for every accepted webhook notification.
///
/// Uniqueness on (provider, event_id) is the idempotency boundary: a second
/// delivery of the same event id is a no-op. Rows are inserted once on first
/// sight and never updated or deleted; they act purely as fencing records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub provider: String,
    pub event_id: String,
    pub event_type: String,
    pub payment_id: String,
    pub received_at: i64,
}
