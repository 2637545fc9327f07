use crate::booking::BookingStatus;
use uuid::Uuid;

/// Error taxonomy of the booking-payment lifecycle. Every kind is
/// recoverable at the caller boundary; none should abort the process.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("at least one passenger is required")]
    InvalidPassengerList,

    #[error("insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: u32, available: i32 },

    #[error("flight not found: {0}")]
    FlightNotFound(Uuid),

    #[error("booking not found: {0}")]
    BookingNotFound(String),

    #[error("booking {reference} is not payable in status {status}")]
    BookingNotPayable {
        reference: String,
        status: BookingStatus,
    },

    #[error("no payment found for provider order {0}")]
    PaymentNotFound(String),

    #[error("payment provider rejected the request: {0}")]
    ProviderDeclined(String),

    #[error("payment provider unreachable: {0}")]
    ProviderUnavailable(String),

    #[error("webhook signature could not be verified")]
    WebhookUnverified,

    #[error("storage error: {0}")]
    Storage(String),
}

/// Faults surfaced by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        LifecycleError::Storage(err.to_string())
    }
}
