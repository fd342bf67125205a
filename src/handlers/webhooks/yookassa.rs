use serde::Deserialize;

/// Provider notification envelope: `{type: "notification", event:
/// "payment.succeeded", object: {...payment...}}`.
///
/// The object is kept as raw JSON here; the ingestor parses it into a
/// [`crate::payments::PaymentObject`] and keeps the raw value for the audit
/// trail on the payment row.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub event: String,
    pub object: serde_json::Value,
}
