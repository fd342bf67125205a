use serde::{Deserialize, Serialize};

/// One provider-side charge attempt for an order. Created when the provider
/// acknowledges a charge, updated by every status report (webhook or poll),
/// never deleted.
///
/// Uniqueness on (provider, provider_payment_id) is the dedup boundary for
/// repeated status reports about the same charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub provider: String,
    pub provider_payment_id: String,
    /// Provider's own status vocabulary, stored raw
    /// (pending / waiting_for_capture / succeeded / canceled).
    pub status: String,
    pub amount: f64,
    pub currency: String,
    /// Last raw event payload, kept for audit/debug.
    pub last_event: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Provider payment status vocabulary, parsed for decisions. Unknown
/// statuses stay on the raw string in [`Payment::status`] and cause no order
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderPaymentStatus {
    Pending,
    WaitingForCapture,
    Succeeded,
    Canceled,
}

impl ProviderPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::WaitingForCapture => "waiting_for_capture",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
        }
    }
}

impl std::str::FromStr for ProviderPaymentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "waiting_for_capture" => Ok(Self::WaitingForCapture),
            "succeeded" => Ok(Self::Succeeded),
            "canceled" => Ok(Self::Canceled),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ProviderPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Data for upserting a payment row from a provider status report.
#[derive(Debug, Clone)]
pub struct UpsertPayment {
    pub order_id: String,
    pub provider: String,
    pub provider_payment_id: String,
    pub status: String,
    pub amount: f64,
    pub currency: String,
    pub last_event: Option<String>,
}
