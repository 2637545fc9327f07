use crate::inventory::InventoryGuard;
use crate::lifecycle::BookingLifecycle;
use crate::reconciler::{PaymentReconciler, WebhookDisposition};
pub use crate::reconciler::RedirectUrls;
use serde::Serialize;
use skylane_core::booking::{Booking, BookingStatus};
use skylane_core::error::LifecycleError;
use skylane_core::flight::{Airport, Flight, FlightQuery};
use skylane_core::money::Money;
use skylane_core::payment::PaymentStatus;
use skylane_core::provider::{PaymentProvider, WebhookHeaders};
use skylane_core::repository::{BookingStore, FlightStore, PaymentStore, WebhookLogStore};
use skylane_core::LifecycleResult;
use std::sync::Arc;
use uuid::Uuid;

/// Receipt for a created payment session.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSessionReceipt {
    pub booking_reference: String,
    pub order_id: String,
    pub approval_url: String,
    pub amount: Money,
}

/// Receipt for an executed payment.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteReceipt {
    pub booking_reference: String,
    pub booking_status: BookingStatus,
    pub payment_status: PaymentStatus,
}

/// Caller-facing operations over the booking-payment lifecycle,
/// abstracted from HTTP. Both the API handlers and the agent tool
/// dispatcher go through this facade.
pub struct BookingService {
    flights: Arc<dyn FlightStore>,
    bookings: Arc<dyn BookingStore>,
    lifecycle: BookingLifecycle,
    reconciler: PaymentReconciler,
}

impl BookingService {
    pub fn new(
        flights: Arc<dyn FlightStore>,
        bookings: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentStore>,
        webhook_log: Arc<dyn WebhookLogStore>,
        provider: Arc<dyn PaymentProvider>,
        urls: RedirectUrls,
    ) -> Self {
        let inventory = InventoryGuard::new(flights.clone());
        let lifecycle = BookingLifecycle::new(bookings.clone(), inventory.clone());
        let reconciler = PaymentReconciler::new(
            bookings.clone(),
            payments,
            webhook_log,
            provider,
            lifecycle.clone(),
            inventory,
            urls,
        );
        Self {
            flights,
            bookings,
            lifecycle,
            reconciler,
        }
    }

    pub async fn list_airports(&self) -> LifecycleResult<Vec<Airport>> {
        self.flights.list_airports().await.map_err(Into::into)
    }

    pub async fn search_flights(&self, query: &FlightQuery) -> LifecycleResult<Vec<Flight>> {
        self.flights.search_flights(query).await.map_err(Into::into)
    }

    pub async fn get_flight(&self, id: Uuid) -> LifecycleResult<Flight> {
        self.flights
            .get_flight(id)
            .await?
            .ok_or(LifecycleError::FlightNotFound(id))
    }

    /// Create a booking in `pending_payment` for the given user.
    pub async fn create_booking(
        &self,
        user_id: &str,
        flight_id: Uuid,
        passengers: Vec<serde_json::Value>,
    ) -> LifecycleResult<Booking> {
        let flight = self.get_flight(flight_id).await?;
        self.lifecycle.create(user_id, &flight, passengers).await
    }

    /// Look up a booking by reference, scoped to its owner.
    pub async fn get_booking(
        &self,
        user_id: &str,
        reference: &str,
    ) -> LifecycleResult<Booking> {
        let booking = self
            .bookings
            .get_booking_by_reference(reference)
            .await?
            .filter(|b| b.user_id == user_id)
            .ok_or_else(|| LifecycleError::BookingNotFound(reference.to_string()))?;
        Ok(booking)
    }

    pub async fn list_bookings(&self, user_id: &str) -> LifecycleResult<Vec<Booking>> {
        self.bookings.list_bookings(user_id).await.map_err(Into::into)
    }

    /// Create a payment session for a payable booking.
    pub async fn create_payment_session(
        &self,
        user_id: &str,
        reference: &str,
    ) -> LifecycleResult<PaymentSessionReceipt> {
        let booking = self.get_booking(user_id, reference).await?;
        let (payment, approval_url) = self.reconciler.create_session(&booking).await?;
        Ok(PaymentSessionReceipt {
            booking_reference: booking.reference,
            order_id: payment.provider_order_id,
            approval_url,
            amount: payment.amount,
        })
    }

    /// Finalize a payment the payer approved out-of-band.
    pub async fn execute_payment(
        &self,
        order_id: &str,
        payer_id: &str,
    ) -> LifecycleResult<ExecuteReceipt> {
        let (payment, booking) = self.reconciler.execute(order_id, payer_id).await?;
        Ok(ExecuteReceipt {
            booking_reference: booking.reference,
            booking_status: booking.status,
            payment_status: payment.status,
        })
    }

    /// Reconcile an inbound provider webhook. Never fails: the provider
    /// expects an acknowledgment regardless, and internal problems are
    /// logged plus captured in the audit log.
    pub async fn handle_provider_webhook(
        &self,
        headers: Option<&WebhookHeaders>,
        payload: serde_json::Value,
    ) -> WebhookDisposition {
        self.reconciler.reconcile_webhook(headers, payload).await
    }
}
