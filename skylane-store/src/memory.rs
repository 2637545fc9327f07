use async_trait::async_trait;
use skylane_core::booking::{Booking, BookingStatus};
use skylane_core::error::StoreError;
use skylane_core::flight::{Airport, Flight, FlightQuery};
use skylane_core::payment::{Payment, PaymentStatus, PaymentTransition, WebhookLog};
use skylane_core::repository::{
    BookingStore, FlightStore, PaymentStore, SeatReservation, WebhookLogStore,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

struct FlightRecord {
    flight: Flight,
    /// Seats promised to pending bookings; not yet subtracted from
    /// `available_seats`.
    reserved: i32,
}

#[derive(Default)]
struct Inner {
    airports: Vec<Airport>,
    flights: HashMap<Uuid, FlightRecord>,
    bookings: HashMap<Uuid, Booking>,
    /// Uniqueness index: reference -> booking id.
    references: HashMap<String, Uuid>,
    /// Payments keyed by provider order id.
    payments: HashMap<String, Payment>,
    /// 1:1 index: booking id -> provider order id.
    payment_by_booking: HashMap<Uuid, String>,
    webhook_log: Vec<WebhookLog>,
}

/// In-memory store for tests and local development. All seat and payment
/// mutations run under a single write lock, so the conditional seat
/// reserve and the payment status compare-and-swap are atomic.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub async fn insert_airport(&self, airport: Airport) {
        self.inner.write().await.airports.push(airport);
    }

    pub async fn insert_flight(&self, flight: Flight) {
        let mut inner = self.inner.write().await;
        inner
            .flights
            .insert(flight.id, FlightRecord { flight, reserved: 0 });
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_airport(airport: &Airport, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    airport.city.to_lowercase().contains(&needle) || airport.code.to_lowercase().contains(&needle)
}

#[async_trait]
impl FlightStore for InMemoryStore {
    async fn get_flight(&self, id: Uuid) -> Result<Option<Flight>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.flights.get(&id).map(|rec| rec.flight.clone()))
    }

    async fn list_airports(&self) -> Result<Vec<Airport>, StoreError> {
        Ok(self.inner.read().await.airports.clone())
    }

    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<Flight>, StoreError> {
        let inner = self.inner.read().await;
        let min_seats = query.passenger_count() as i32;

        let mut results: Vec<Flight> = inner
            .flights
            .values()
            .filter(|rec| {
                if let Some(departure) = &query.departure {
                    if !matches_airport(&rec.flight.departure_airport, departure) {
                        return false;
                    }
                }
                if let Some(arrival) = &query.arrival {
                    if !matches_airport(&rec.flight.arrival_airport, arrival) {
                        return false;
                    }
                }
                if let Some(date) = query.date {
                    if rec.flight.departure_time.date_naive() != date {
                        return false;
                    }
                }
                rec.flight.available_seats - rec.reserved >= min_seats
            })
            .map(|rec| rec.flight.clone())
            .collect();

        results.sort_by_key(|f| f.departure_time);
        Ok(results)
    }

    async fn try_reserve_seats(
        &self,
        flight_id: Uuid,
        count: u32,
    ) -> Result<SeatReservation, StoreError> {
        let mut inner = self.inner.write().await;
        let rec = inner.flights.get_mut(&flight_id).ok_or(StoreError::NotFound)?;

        let available = rec.flight.available_seats - rec.reserved;
        if available >= count as i32 {
            rec.reserved += count as i32;
            Ok(SeatReservation::Reserved)
        } else {
            Ok(SeatReservation::Insufficient { available })
        }
    }

    async fn commit_seats(&self, flight_id: Uuid, count: u32) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let rec = inner.flights.get_mut(&flight_id).ok_or(StoreError::NotFound)?;

        let count = count as i32;
        if rec.flight.available_seats < count || rec.reserved < count {
            return Err(StoreError::Conflict(format!(
                "seat commit of {} would break inventory invariants on flight {}",
                count, flight_id
            )));
        }

        rec.flight.available_seats -= count;
        rec.reserved -= count;
        Ok(())
    }

    async fn release_seats(
        &self,
        flight_id: Uuid,
        count: u32,
        seats_committed: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let rec = inner.flights.get_mut(&flight_id).ok_or(StoreError::NotFound)?;

        if seats_committed {
            rec.flight.available_seats += count as i32;
        } else {
            rec.reserved = (rec.reserved - count as i32).max(0);
        }
        Ok(())
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn create_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.references.contains_key(&booking.reference) {
            return Err(StoreError::Conflict(format!(
                "duplicate booking reference {}",
                booking.reference
            )));
        }
        inner
            .references
            .insert(booking.reference.clone(), booking.id);
        inner.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.inner.read().await.bookings.get(&id).cloned())
    }

    async fn get_booking_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .references
            .get(reference)
            .and_then(|id| inner.bookings.get(id))
            .cloned())
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let booking = inner.bookings.get_mut(&id).ok_or(StoreError::NotFound)?;
        booking.status = status;
        booking.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn list_bookings(&self, user_id: &str) -> Result<Vec<Booking>, StoreError> {
        let inner = self.inner.read().await;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn create_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.payment_by_booking.contains_key(&payment.booking_id) {
            return Err(StoreError::Conflict(format!(
                "booking {} already has a payment",
                payment.booking_id
            )));
        }
        if inner.payments.contains_key(&payment.provider_order_id) {
            return Err(StoreError::Conflict(format!(
                "duplicate provider order id {}",
                payment.provider_order_id
            )));
        }
        inner
            .payment_by_booking
            .insert(payment.booking_id, payment.provider_order_id.clone());
        inner
            .payments
            .insert(payment.provider_order_id.clone(), payment.clone());
        Ok(())
    }

    async fn get_payment_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<Payment>, StoreError> {
        Ok(self.inner.read().await.payments.get(order_id).cloned())
    }

    async fn get_payment_by_booking_id(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<Payment>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .payment_by_booking
            .get(&booking_id)
            .and_then(|order_id| inner.payments.get(order_id))
            .cloned())
    }

    async fn transition_payment(
        &self,
        order_id: &str,
        allowed_from: &[PaymentStatus],
        to: PaymentStatus,
        payer_id: Option<&str>,
    ) -> Result<PaymentTransition, StoreError> {
        let mut inner = self.inner.write().await;
        let payment = inner.payments.get_mut(order_id).ok_or(StoreError::NotFound)?;

        if payment.status == to {
            return Ok(PaymentTransition::AlreadyApplied);
        }
        if !allowed_from.contains(&payment.status) {
            return Ok(PaymentTransition::Rejected {
                current: payment.status,
            });
        }

        let previous = payment.status;
        payment.status = to;
        if let Some(payer_id) = payer_id {
            payment.payer_id = Some(payer_id.to_string());
        }
        payment.updated_at = chrono::Utc::now();
        Ok(PaymentTransition::Applied { previous })
    }
}

#[async_trait]
impl WebhookLogStore for InMemoryStore {
    async fn append(&self, entry: &WebhookLog) -> Result<(), StoreError> {
        self.inner.write().await.webhook_log.push(entry.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WebhookLog>, StoreError> {
        Ok(self.inner.read().await.webhook_log.clone())
    }
}
