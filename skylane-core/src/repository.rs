use crate::booking::{Booking, BookingStatus};
use crate::error::StoreError;
use crate::flight::{Airport, Flight, FlightQuery};
use crate::payment::{Payment, PaymentStatus, PaymentTransition, WebhookLog};
use async_trait::async_trait;
use uuid::Uuid;

/// Result of the atomic check-and-reserve on a flight's seats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatReservation {
    Reserved,
    Insufficient { available: i32 },
}

/// Store trait for flight data and the atomic seat primitives the
/// Inventory Guard builds on. Reservations track seats promised to
/// pending bookings without touching `available_seats`; the decrement
/// happens only at commit time.
#[async_trait]
pub trait FlightStore: Send + Sync {
    async fn get_flight(&self, id: Uuid) -> Result<Option<Flight>, StoreError>;

    async fn list_airports(&self) -> Result<Vec<Airport>, StoreError>;

    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<Flight>, StoreError>;

    /// Atomic: succeeds iff `reserved + count <= available_seats`.
    async fn try_reserve_seats(
        &self,
        flight_id: Uuid,
        count: u32,
    ) -> Result<SeatReservation, StoreError>;

    /// Decrement `available_seats` and the reservation counter together.
    /// Called exactly once per booking, at payment confirmation.
    async fn commit_seats(&self, flight_id: Uuid, count: u32) -> Result<(), StoreError>;

    /// Return capacity on cancellation. If the seats were already
    /// committed, `available_seats` goes back up; otherwise only the
    /// reservation counter drops.
    async fn release_seats(
        &self,
        flight_id: Uuid,
        count: u32,
        seats_committed: bool,
    ) -> Result<(), StoreError>;
}

/// Store trait for bookings. `create_booking` must reject a duplicate
/// reference with `StoreError::Conflict` so the reference generator can
/// retry with a fresh code.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn get_booking_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, StoreError>;

    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<(), StoreError>;

    async fn list_bookings(&self, user_id: &str) -> Result<Vec<Booking>, StoreError>;
}

/// Store trait for payments. One payment per booking; a second
/// `create_payment` for the same booking is a `Conflict`.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create_payment(&self, payment: &Payment) -> Result<(), StoreError>;

    async fn get_payment_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<Payment>, StoreError>;

    async fn get_payment_by_booking_id(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<Payment>, StoreError>;

    /// Compare-and-swap the payment status. Applies `to` only if the
    /// current status is in `allowed_from`; reports whether this call
    /// won the transition, found it already applied, or was rejected.
    async fn transition_payment(
        &self,
        order_id: &str,
        allowed_from: &[PaymentStatus],
        to: PaymentStatus,
        payer_id: Option<&str>,
    ) -> Result<PaymentTransition, StoreError>;
}

/// Append-only webhook audit log.
#[async_trait]
pub trait WebhookLogStore: Send + Sync {
    async fn append(&self, entry: &WebhookLog) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<WebhookLog>, StoreError>;
}
