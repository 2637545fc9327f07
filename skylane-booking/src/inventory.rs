use skylane_core::error::{LifecycleError, StoreError};
use skylane_core::repository::{FlightStore, SeatReservation};
use skylane_core::LifecycleResult;
use std::sync::Arc;
use uuid::Uuid;

/// Enforces the seat-count invariants on a flight. The guard never lets
/// `available_seats` go negative: the reserve step is an atomic
/// check-and-hold in the store, and the decrement happens exactly once,
/// at payment confirmation.
#[derive(Clone)]
pub struct InventoryGuard {
    flights: Arc<dyn FlightStore>,
}

impl InventoryGuard {
    pub fn new(flights: Arc<dyn FlightStore>) -> Self {
        Self { flights }
    }

    /// Hold `count` seats for a booking being created. Rejects with
    /// `InsufficientSeats` when the flight cannot cover the request on
    /// top of its outstanding holds.
    pub async fn reserve(&self, flight_id: Uuid, count: u32) -> LifecycleResult<()> {
        match self.flights.try_reserve_seats(flight_id, count).await {
            Ok(SeatReservation::Reserved) => Ok(()),
            Ok(SeatReservation::Insufficient { available }) => {
                Err(LifecycleError::InsufficientSeats {
                    requested: count,
                    available,
                })
            }
            Err(StoreError::NotFound) => Err(LifecycleError::FlightNotFound(flight_id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Turn a hold into a real decrement. Called once per booking, when
    /// the payment is confirmed.
    pub async fn confirm(&self, flight_id: Uuid, count: u32) -> LifecycleResult<()> {
        self.flights
            .commit_seats(flight_id, count)
            .await
            .map_err(Into::into)
    }

    /// Return capacity on cancellation or refund. `seats_committed`
    /// says whether the booking had reached confirmation (seats were
    /// decremented) or was still holding a reservation.
    pub async fn release(
        &self,
        flight_id: Uuid,
        count: u32,
        seats_committed: bool,
    ) -> LifecycleResult<()> {
        self.flights
            .release_seats(flight_id, count, seats_committed)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use skylane_core::flight::{Airport, Flight};
    use skylane_core::money::Money;
    use skylane_store::InMemoryStore;

    fn test_flight(seats: i32) -> Flight {
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
            price: Money::new(20000, "USD"),
            available_seats: seats,
            airline: "Skylane Air".to_string(),
            aircraft_type: "A320".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_reserve_rejects_over_capacity() {
        let store = Arc::new(InMemoryStore::new());
        let flight = test_flight(2);
        let flight_id = flight.id;
        store.insert_flight(flight).await;

        let guard = InventoryGuard::new(store.clone());
        guard.reserve(flight_id, 2).await.unwrap();

        let err = guard.reserve(flight_id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InsufficientSeats {
                requested: 1,
                available: 0
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_flight() {
        let store = Arc::new(InMemoryStore::new());
        let guard = InventoryGuard::new(store);
        let err = guard.reserve(Uuid::new_v4(), 1).await.unwrap_err();
        assert!(matches!(err, LifecycleError::FlightNotFound(_)));
    }
}
