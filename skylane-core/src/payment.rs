use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Paypal,
    Stripe,
    Card,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

/// One payment per booking, keyed by the provider-assigned order id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: Money,
    pub method: PaymentMethod,
    pub provider_order_id: String,
    /// Set only when the synchronous execute path completes.
    pub payer_id: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn pending(booking_id: Uuid, amount: Money, method: PaymentMethod, order_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            amount,
            method,
            provider_order_id: order_id,
            payer_id: None,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of the store-level compare-and-swap on a payment's status.
/// The synchronous execute path and the asynchronous webhook path both
/// funnel through this; only the caller that actually applied the
/// transition may mutate booking state or inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentTransition {
    Applied { previous: PaymentStatus },
    AlreadyApplied,
    Rejected { current: PaymentStatus },
}

/// Append-only audit record of every inbound webhook, valid or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookLog {
    pub id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl WebhookLog {
    pub fn new(event_type: String, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            payload,
            created_at: Utc::now(),
        }
    }
}
