use crate::flight::Flight;
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Booking status in the lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Allowed transition table. `Cancelled` and `Completed` are terminal.
    pub fn can_transition_to(self, to: BookingStatus) -> bool {
        matches!(
            (self, to),
            (BookingStatus::PendingPayment, BookingStatus::Confirmed)
                | (BookingStatus::PendingPayment, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::PendingPayment => "pending_payment",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: String,
    pub flight_id: Uuid,
    pub reference: String,
    pub status: BookingStatus,
    /// Opaque passenger records supplied by the caller, count >= 1.
    pub passengers: Vec<serde_json::Value>,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Total amount is fixed at creation: price x passenger count.
    /// Later fare changes never touch existing bookings.
    pub fn new(
        user_id: String,
        flight: &Flight,
        reference: String,
        passengers: Vec<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        let total_amount = flight.price.times(passengers.len() as u32);
        Self {
            id: Uuid::new_v4(),
            user_id,
            flight_id: flight.id,
            reference,
            status: BookingStatus::PendingPayment,
            passengers,
            total_amount,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn passenger_count(&self) -> u32 {
        self.passengers.len() as u32
    }
}
