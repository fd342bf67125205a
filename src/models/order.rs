use serde::{Deserialize, Serialize};

/// A buyer's purchase intent for one album, tracked through a status
/// lifecycle. Created by checkout, mutated only by reconciliation, never
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub album_id: String,
    pub customer_email: String,
    pub billing_name: Option<String>,
    pub billing_phone: Option<String>,
    /// Immutable after creation; must match the amount the provider confirms
    /// at charge time.
    pub amount: f64,
    pub currency: String,
    pub status: OrderStatus,
    /// The musician selling this album. Used to resolve provider
    /// credentials; `None` means the platform account.
    pub seller_id: Option<String>,
    /// Provider payment reference, set once a charge is created.
    pub payment_id: Option<String>,
    pub paid_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Data required to create a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub album_id: String,
    pub customer_email: String,
    pub billing_name: Option<String>,
    pub billing_phone: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub seller_id: Option<String>,
}

/// Order status state machine: `pending_payment` -> `paid` | `canceled`.
/// Terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Canceled)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(Self::PendingPayment),
            "paid" => Ok(Self::Paid),
            "canceled" => Ok(Self::Canceled),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a requested order status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// This call performed the pending -> terminal transition.
    Applied,
    /// The order was already in the target state; idempotent no-op.
    Noop,
    /// The order is in a different terminal state; the request is refused.
    Conflict(OrderStatus),
}
