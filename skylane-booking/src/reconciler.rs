use crate::inventory::InventoryGuard;
use crate::lifecycle::BookingLifecycle;
use skylane_core::booking::{Booking, BookingStatus};
use skylane_core::error::{LifecycleError, StoreError};
use skylane_core::payment::{Payment, PaymentMethod, PaymentStatus, PaymentTransition, WebhookLog};
use skylane_core::provider::{PaymentProvider, WebhookHeaders};
use skylane_core::repository::{BookingStore, PaymentStore, WebhookLogStore};
use skylane_core::LifecycleResult;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const EVENT_SALE_COMPLETED: &str = "PAYMENT.SALE.COMPLETED";
pub const EVENT_SALE_REFUNDED: &str = "PAYMENT.SALE.REFUNDED";

/// Redirect targets handed to the provider when a session is created.
#[derive(Debug, Clone)]
pub struct RedirectUrls {
    pub return_url: String,
    pub cancel_url: String,
}

/// What became of an inbound webhook. The HTTP layer acknowledges every
/// delivery regardless; this is for logging and the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookDisposition {
    /// The event moved payment/booking state.
    Applied,
    /// A duplicate of a transition that had already been applied.
    AlreadyApplied,
    /// Logged but not applied: unknown event, unknown order id,
    /// unverifiable signature, or an anomalous ordering.
    Ignored,
}

/// Mediates between internal payment state and the provider's
/// synchronous (execute) and asynchronous (webhook) channels. Both
/// channels funnel through a compare-and-swap on the payment row, so
/// duplicates and out-of-order deliveries cannot double-apply.
pub struct PaymentReconciler {
    bookings: Arc<dyn BookingStore>,
    payments: Arc<dyn PaymentStore>,
    webhook_log: Arc<dyn WebhookLogStore>,
    provider: Arc<dyn PaymentProvider>,
    lifecycle: BookingLifecycle,
    inventory: InventoryGuard,
    urls: RedirectUrls,
}

impl PaymentReconciler {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentStore>,
        webhook_log: Arc<dyn WebhookLogStore>,
        provider: Arc<dyn PaymentProvider>,
        lifecycle: BookingLifecycle,
        inventory: InventoryGuard,
        urls: RedirectUrls,
    ) -> Self {
        Self {
            bookings,
            payments,
            webhook_log,
            provider,
            lifecycle,
            inventory,
            urls,
        }
    }

    /// Create a payment session with the provider for a payable booking.
    /// Persists a `pending` Payment keyed by the provider order id and
    /// returns it with the approval redirect URL; the booking itself is
    /// untouched until the payment confirms.
    pub async fn create_session(
        &self,
        booking: &Booking,
    ) -> LifecycleResult<(Payment, String)> {
        if booking.status != BookingStatus::PendingPayment {
            return Err(LifecycleError::BookingNotPayable {
                reference: booking.reference.clone(),
                status: booking.status,
            });
        }
        // One payment per booking. A session that was created but never
        // executed blocks a second attempt; see DESIGN.md.
        if self
            .payments
            .get_payment_by_booking_id(booking.id)
            .await?
            .is_some()
        {
            return Err(LifecycleError::BookingNotPayable {
                reference: booking.reference.clone(),
                status: booking.status,
            });
        }

        let custom = serde_json::json!({
            "booking_ref": booking.reference,
            "user_id": booking.user_id,
        });
        let session = self
            .provider
            .create_payment(
                &booking.total_amount,
                &format!("Flight booking {}", booking.reference),
                &custom,
                &self.urls.return_url,
                &self.urls.cancel_url,
            )
            .await?;

        let payment = Payment::pending(
            booking.id,
            booking.total_amount.clone(),
            PaymentMethod::Paypal,
            session.order_id,
        );
        self.payments.create_payment(&payment).await?;

        info!(
            "payment session {} created for booking {}",
            payment.provider_order_id, booking.reference
        );
        Ok((payment, session.approval_url))
    }

    /// Synchronous confirmation path: ask the provider to finalize the
    /// payment, then apply the `completed` transition. Provider failures
    /// leave payment and booking untouched. A payment that has already
    /// left `pending` (a refund webhook can land before the browser
    /// redirect) is refused without calling the provider.
    pub async fn execute(
        &self,
        order_id: &str,
        payer_id: &str,
    ) -> LifecycleResult<(Payment, Booking)> {
        let payment = self
            .payments
            .get_payment_by_order_id(order_id)
            .await?
            .ok_or_else(|| LifecycleError::PaymentNotFound(order_id.to_string()))?;
        if payment.status != PaymentStatus::Pending {
            warn!(
                "refusing execute for order {} in payment status {}",
                order_id, payment.status
            );
            let booking = self.booking_for_order(order_id).await?;
            return Err(LifecycleError::BookingNotPayable {
                reference: booking.reference,
                status: booking.status,
            });
        }

        self.provider.execute_payment(order_id, payer_id).await?;

        if let PaymentTransition::Rejected { current } =
            self.apply_completed(order_id, Some(payer_id)).await?
        {
            // The webhook path moved the payment while the provider call
            // was in flight.
            warn!(
                "payment for order {} moved to {} during execute",
                order_id, current
            );
            let booking = self.booking_for_order(order_id).await?;
            return Err(LifecycleError::BookingNotPayable {
                reference: booking.reference,
                status: booking.status,
            });
        }

        let payment = self
            .payments
            .get_payment_by_order_id(order_id)
            .await?
            .ok_or_else(|| LifecycleError::PaymentNotFound(order_id.to_string()))?;
        let booking = self
            .bookings
            .get_booking(payment.booking_id)
            .await?
            .ok_or_else(|| LifecycleError::BookingNotFound(payment.booking_id.to_string()))?;
        Ok((payment, booking))
    }

    /// Asynchronous reconciliation path. At-least-once, possibly
    /// duplicated, possibly out of order. Every payload is appended to
    /// the audit log before any processing; the caller always returns a
    /// 200-class acknowledgment to the provider, so failures here are
    /// logged rather than surfaced.
    pub async fn reconcile_webhook(
        &self,
        headers: Option<&WebhookHeaders>,
        payload: serde_json::Value,
    ) -> WebhookDisposition {
        let event_type = payload["event_type"]
            .as_str()
            .unwrap_or("unknown")
            .to_string();

        let entry = WebhookLog::new(event_type.clone(), payload.clone());
        if let Err(err) = self.webhook_log.append(&entry).await {
            // The log is the out-of-band audit path; losing an entry is
            // worth an error but must not block reconciliation.
            warn!("failed to append webhook audit log entry: {}", err);
        }

        if let Some(headers) = headers {
            match self.provider.verify_webhook(headers, &payload).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!("webhook signature verification failed for {}", event_type);
                    return WebhookDisposition::Ignored;
                }
                Err(err) => {
                    warn!("webhook could not be verified ({}): {}", event_type, err);
                    return WebhookDisposition::Ignored;
                }
            }
        } else {
            debug!("webhook delivered without signature headers; verification skipped");
        }

        let order_id = match payload["resource"]["parent_payment"].as_str() {
            Some(id) => id.to_string(),
            None => {
                warn!("webhook {} carries no resource.parent_payment", event_type);
                return WebhookDisposition::Ignored;
            }
        };

        let result = match event_type.as_str() {
            EVENT_SALE_COMPLETED => self.apply_completed(&order_id, None).await,
            EVENT_SALE_REFUNDED => self.apply_refunded(&order_id).await,
            other => {
                debug!("ignoring webhook event type {}", other);
                return WebhookDisposition::Ignored;
            }
        };

        match result {
            Ok(PaymentTransition::Applied { .. }) => WebhookDisposition::Applied,
            Ok(PaymentTransition::AlreadyApplied) => {
                debug!("duplicate {} for order {}", event_type, order_id);
                WebhookDisposition::AlreadyApplied
            }
            Ok(PaymentTransition::Rejected { current }) => {
                warn!(
                    "anomalous {} for order {} in status {}; not applied",
                    event_type, order_id, current
                );
                WebhookDisposition::Ignored
            }
            Err(LifecycleError::PaymentNotFound(_)) => {
                info!("webhook for unknown order {}; no-op", order_id);
                WebhookDisposition::Ignored
            }
            Err(err) => {
                warn!("webhook reconciliation failed for order {}: {}", order_id, err);
                WebhookDisposition::Ignored
            }
        }
    }

    /// Apply `pending -> completed`. Only the caller whose CAS lands
    /// confirms the booking and commits seats, so the execute/webhook
    /// race resolves to exactly one decrement.
    async fn apply_completed(
        &self,
        order_id: &str,
        payer_id: Option<&str>,
    ) -> LifecycleResult<PaymentTransition> {
        let outcome = self
            .transition(order_id, &[PaymentStatus::Pending], PaymentStatus::Completed, payer_id)
            .await?;

        if let PaymentTransition::Applied { .. } = outcome {
            let booking = self.booking_for_order(order_id).await?;
            if self
                .lifecycle
                .transition(&booking, BookingStatus::Confirmed)
                .await?
            {
                self.inventory
                    .confirm(booking.flight_id, booking.passenger_count())
                    .await?;
                info!(
                    "booking {} confirmed, {} seats committed",
                    booking.reference,
                    booking.passenger_count()
                );
            }
        }
        Ok(outcome)
    }

    /// Apply `pending|completed -> refunded`. A refund after capture is
    /// valid; the booking cancels and seats return to the pool.
    async fn apply_refunded(&self, order_id: &str) -> LifecycleResult<PaymentTransition> {
        let outcome = self
            .transition(
                order_id,
                &[PaymentStatus::Pending, PaymentStatus::Completed],
                PaymentStatus::Refunded,
                None,
            )
            .await?;

        if let PaymentTransition::Applied { previous } = outcome {
            let booking = self.booking_for_order(order_id).await?;
            if self
                .lifecycle
                .transition(&booking, BookingStatus::Cancelled)
                .await?
            {
                // Seats were only committed if the payment had completed.
                let seats_committed = previous == PaymentStatus::Completed;
                self.inventory
                    .release(booking.flight_id, booking.passenger_count(), seats_committed)
                    .await?;
                info!(
                    "booking {} cancelled on refund, {} seats released",
                    booking.reference,
                    booking.passenger_count()
                );
            }
        }
        Ok(outcome)
    }

    async fn transition(
        &self,
        order_id: &str,
        allowed_from: &[PaymentStatus],
        to: PaymentStatus,
        payer_id: Option<&str>,
    ) -> LifecycleResult<PaymentTransition> {
        match self
            .payments
            .transition_payment(order_id, allowed_from, to, payer_id)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(StoreError::NotFound) => {
                Err(LifecycleError::PaymentNotFound(order_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn booking_for_order(&self, order_id: &str) -> LifecycleResult<Booking> {
        let payment = self
            .payments
            .get_payment_by_order_id(order_id)
            .await?
            .ok_or_else(|| LifecycleError::PaymentNotFound(order_id.to_string()))?;
        self.bookings
            .get_booking(payment.booking_id)
            .await?
            .ok_or_else(|| LifecycleError::BookingNotFound(payment.booking_id.to_string()))
    }
}
