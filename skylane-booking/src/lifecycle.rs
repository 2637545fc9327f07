use crate::inventory::InventoryGuard;
use skylane_core::booking::{Booking, BookingStatus};
use skylane_core::error::{LifecycleError, StoreError};
use skylane_core::flight::Flight;
use skylane_core::reference::generate_reference;
use skylane_core::repository::BookingStore;
use skylane_core::LifecycleResult;
use std::sync::Arc;
use tracing::warn;

/// How many fresh reference codes we try before giving up on a create.
/// Collisions in a 36^8 space are vanishingly rare; the loop exists so a
/// store-level uniqueness conflict is retried instead of surfaced.
const MAX_REFERENCE_ATTEMPTS: usize = 5;

/// The booking state machine: creates bookings in `pending_payment` and
/// applies validity-checked, idempotent status transitions.
#[derive(Clone)]
pub struct BookingLifecycle {
    bookings: Arc<dyn BookingStore>,
    inventory: InventoryGuard,
}

impl BookingLifecycle {
    pub fn new(bookings: Arc<dyn BookingStore>, inventory: InventoryGuard) -> Self {
        Self { bookings, inventory }
    }

    /// Create a booking for `user_id` on `flight`. Seats are held (not
    /// decremented) through the Inventory Guard; the hold is released if
    /// persistence fails after it was taken.
    pub async fn create(
        &self,
        user_id: &str,
        flight: &Flight,
        passengers: Vec<serde_json::Value>,
    ) -> LifecycleResult<Booking> {
        if passengers.is_empty() {
            return Err(LifecycleError::InvalidPassengerList);
        }
        let count = passengers.len() as u32;

        self.inventory.reserve(flight.id, count).await?;

        for _ in 0..MAX_REFERENCE_ATTEMPTS {
            let booking = Booking::new(
                user_id.to_string(),
                flight,
                generate_reference(),
                passengers.clone(),
            );
            match self.bookings.create_booking(&booking).await {
                Ok(()) => return Ok(booking),
                Err(StoreError::Conflict(msg)) => {
                    warn!("booking reference collision, regenerating: {}", msg);
                    continue;
                }
                Err(err) => {
                    self.rollback_reservation(flight, count).await;
                    return Err(err.into());
                }
            }
        }

        self.rollback_reservation(flight, count).await;
        Err(LifecycleError::Storage(
            "could not allocate a unique booking reference".to_string(),
        ))
    }

    async fn rollback_reservation(&self, flight: &Flight, count: u32) {
        if let Err(err) = self.inventory.release(flight.id, count, false).await {
            warn!(
                "failed to release {} held seats on flight {}: {}",
                count, flight.id, err
            );
        }
    }

    /// Apply a status transition. Returns `true` when this call changed
    /// the booking, `false` when it was a no-op: same status again, or a
    /// transition the table forbids, which is logged and never applied.
    /// Callers decrement inventory only on `true`.
    pub async fn transition(
        &self,
        booking: &Booking,
        to: BookingStatus,
    ) -> LifecycleResult<bool> {
        if booking.status == to {
            return Ok(false);
        }
        if !booking.status.can_transition_to(to) {
            warn!(
                "refusing booking {} transition {} -> {}",
                booking.reference, booking.status, to
            );
            return Ok(false);
        }
        self.bookings.update_booking_status(booking.id, to).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use skylane_core::flight::Airport;
    use skylane_core::money::Money;
    use skylane_core::repository::FlightStore;
    use skylane_store::InMemoryStore;
    use uuid::Uuid;

    fn test_flight(seats: i32, price_minor: i64) -> Flight {
        let airport = |code: &str, city: &str| Airport {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: format!("{} Airport", city),
            city: city.to_string(),
            country: "US".to_string(),
        };
        Flight {
            id: Uuid::new_v4(),
            flight_number: "SL101".to_string(),
            departure_airport: airport("JFK", "New York"),
            arrival_airport: airport("LAX", "Los Angeles"),
            departure_time: Utc::now(),
            arrival_time: Utc::now() + chrono::Duration::hours(6),
            price: Money::new(price_minor, "USD"),
            available_seats: seats,
            airline: "Skylane Air".to_string(),
            aircraft_type: "A320".to_string(),
            created_at: Utc::now(),
        }
    }

    fn passengers(n: usize) -> Vec<serde_json::Value> {
        (0..n)
            .map(|i| serde_json::json!({"first_name": format!("Pax{}", i), "last_name": "Doe"}))
            .collect()
    }

    fn lifecycle(store: Arc<InMemoryStore>) -> BookingLifecycle {
        BookingLifecycle::new(store.clone(), InventoryGuard::new(store))
    }

    #[tokio::test]
    async fn test_create_computes_total_and_holds_seats() {
        let store = Arc::new(InMemoryStore::new());
        let flight = test_flight(3, 20000);
        let flight_id = flight.id;
        store.insert_flight(flight.clone()).await;

        let booking = lifecycle(store.clone())
            .create("user-1", &flight, passengers(2))
            .await
            .unwrap();

        assert_eq!(booking.status, BookingStatus::PendingPayment);
        assert_eq!(booking.total_amount.amount_minor, 40000);
        assert_eq!(booking.reference.len(), 8);
        // Seats are held, not decremented.
        assert_eq!(
            store.get_flight(flight_id).await.unwrap().unwrap().available_seats,
            3
        );
    }

    #[tokio::test]
    async fn test_empty_passenger_list_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let flight = test_flight(3, 20000);
        store.insert_flight(flight.clone()).await;

        let err = lifecycle(store)
            .create("user-1", &flight, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidPassengerList));
    }

    #[tokio::test]
    async fn test_insufficient_seats_leaves_nothing_behind() {
        let store = Arc::new(InMemoryStore::new());
        let flight = test_flight(1, 20000);
        let flight_id = flight.id;
        store.insert_flight(flight.clone()).await;

        let err = lifecycle(store.clone())
            .create("user-1", &flight, passengers(2))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InsufficientSeats { .. }));
        assert!(store.list_bookings("user-1").await.unwrap().is_empty());
        assert_eq!(
            store.get_flight(flight_id).await.unwrap().unwrap().available_seats,
            1
        );
    }

    use async_trait::async_trait;
    use skylane_core::repository::SeatReservation;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Conflicts on the first `conflicts_left` creates, then delegates.
    /// Records every reference it was offered.
    struct ConflictingBookingStore {
        inner: Arc<InMemoryStore>,
        conflicts_left: AtomicUsize,
        seen_references: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BookingStore for ConflictingBookingStore {
        async fn create_booking(&self, booking: &Booking) -> Result<(), StoreError> {
            self.seen_references
                .lock()
                .unwrap()
                .push(booking.reference.clone());
            if self
                .conflicts_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Conflict(format!(
                    "duplicate booking reference {}",
                    booking.reference
                )));
            }
            self.inner.create_booking(booking).await
        }

        async fn get_booking(&self, id: uuid::Uuid) -> Result<Option<Booking>, StoreError> {
            self.inner.get_booking(id).await
        }

        async fn get_booking_by_reference(
            &self,
            reference: &str,
        ) -> Result<Option<Booking>, StoreError> {
            self.inner.get_booking_by_reference(reference).await
        }

        async fn update_booking_status(
            &self,
            id: uuid::Uuid,
            status: BookingStatus,
        ) -> Result<(), StoreError> {
            self.inner.update_booking_status(id, status).await
        }

        async fn list_bookings(&self, user_id: &str) -> Result<Vec<Booking>, StoreError> {
            self.inner.list_bookings(user_id).await
        }
    }

    /// Every create fails as infrastructure trouble.
    struct BrokenBookingStore {
        inner: Arc<InMemoryStore>,
    }

    #[async_trait]
    impl BookingStore for BrokenBookingStore {
        async fn create_booking(&self, _booking: &Booking) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection reset".to_string()))
        }

        async fn get_booking(&self, id: uuid::Uuid) -> Result<Option<Booking>, StoreError> {
            self.inner.get_booking(id).await
        }

        async fn get_booking_by_reference(
            &self,
            reference: &str,
        ) -> Result<Option<Booking>, StoreError> {
            self.inner.get_booking_by_reference(reference).await
        }

        async fn update_booking_status(
            &self,
            id: uuid::Uuid,
            status: BookingStatus,
        ) -> Result<(), StoreError> {
            self.inner.update_booking_status(id, status).await
        }

        async fn list_bookings(&self, user_id: &str) -> Result<Vec<Booking>, StoreError> {
            self.inner.list_bookings(user_id).await
        }
    }

    #[tokio::test]
    async fn test_reference_conflict_retries_with_fresh_code() {
        let store = Arc::new(InMemoryStore::new());
        let flight = test_flight(3, 20000);
        store.insert_flight(flight.clone()).await;

        let bookings = Arc::new(ConflictingBookingStore {
            inner: store.clone(),
            conflicts_left: AtomicUsize::new(2),
            seen_references: Mutex::new(Vec::new()),
        });
        let machine = BookingLifecycle::new(bookings.clone(), InventoryGuard::new(store.clone()));

        let booking = machine
            .create("user-1", &flight, passengers(1))
            .await
            .unwrap();

        let seen = bookings.seen_references.lock().unwrap().clone();
        assert_eq!(seen.len(), 3);
        // Each attempt carried a freshly generated reference.
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 3);
        assert_eq!(booking.reference, seen[2]);
        assert!(store
            .get_booking_by_reference(&booking.reference)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_exhausted_reference_attempts_release_the_hold() {
        let store = Arc::new(InMemoryStore::new());
        let flight = test_flight(2, 20000);
        let flight_id = flight.id;
        store.insert_flight(flight.clone()).await;

        let bookings = Arc::new(ConflictingBookingStore {
            inner: store.clone(),
            conflicts_left: AtomicUsize::new(MAX_REFERENCE_ATTEMPTS),
            seen_references: Mutex::new(Vec::new()),
        });
        let machine = BookingLifecycle::new(bookings.clone(), InventoryGuard::new(store.clone()));

        let err = machine
            .create("user-1", &flight, passengers(2))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Storage(_)));
        assert_eq!(
            bookings.seen_references.lock().unwrap().len(),
            MAX_REFERENCE_ATTEMPTS
        );
        // The seat hold came back: the full cabin is reservable again.
        assert_eq!(
            store.try_reserve_seats(flight_id, 2).await.unwrap(),
            SeatReservation::Reserved
        );
    }

    #[tokio::test]
    async fn test_store_failure_releases_the_hold() {
        let store = Arc::new(InMemoryStore::new());
        let flight = test_flight(2, 20000);
        let flight_id = flight.id;
        store.insert_flight(flight.clone()).await;

        let bookings = Arc::new(BrokenBookingStore {
            inner: store.clone(),
        });
        let machine = BookingLifecycle::new(bookings, InventoryGuard::new(store.clone()));

        let err = machine
            .create("user-1", &flight, passengers(2))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Storage(_)));
        assert_eq!(
            store.get_flight(flight_id).await.unwrap().unwrap().available_seats,
            2
        );
        assert_eq!(
            store.try_reserve_seats(flight_id, 2).await.unwrap(),
            SeatReservation::Reserved
        );
    }

    #[tokio::test]
    async fn test_transition_is_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        let flight = test_flight(3, 20000);
        store.insert_flight(flight.clone()).await;

        let machine = lifecycle(store.clone());
        let booking = machine.create("user-1", &flight, passengers(1)).await.unwrap();

        assert!(machine
            .transition(&booking, BookingStatus::Confirmed)
            .await
            .unwrap());

        let confirmed = store.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        // Re-applying the same transition is a no-op.
        assert!(!machine
            .transition(&confirmed, BookingStatus::Confirmed)
            .await
            .unwrap());
        // A forbidden transition is refused without erroring.
        let cancelled = {
            machine.transition(&confirmed, BookingStatus::Cancelled).await.unwrap();
            store.get_booking(booking.id).await.unwrap().unwrap()
        };
        assert!(!machine
            .transition(&cancelled, BookingStatus::Confirmed)
            .await
            .unwrap());
        assert_eq!(
            store.get_booking(booking.id).await.unwrap().unwrap().status,
            BookingStatus::Cancelled
        );
    }
}
