use chrono::Utc;
use skylane_booking::mock::MockPaymentProvider;
use skylane_booking::{BookingService, RedirectUrls, WebhookDisposition};
use skylane_core::booking::BookingStatus;
use skylane_core::error::LifecycleError;
use skylane_core::flight::{Airport, Flight};
use skylane_core::money::Money;
use skylane_core::payment::PaymentStatus;
use skylane_core::provider::WebhookHeaders;
use skylane_core::repository::{FlightStore, PaymentStore, WebhookLogStore};
use std::sync::Arc;
use uuid::Uuid;

use skylane_store::InMemoryStore;

fn airport(code: &str, city: &str) -> Airport {
    Airport {
        id: Uuid::new_v4(),
        code: code.to_string(),
        name: format!("{} International", city),
        city: city.to_string(),
        country: "US".to_string(),
    }
}

fn flight(seats: i32, price_minor: i64) -> Flight {
    Flight {
        id: Uuid::new_v4(),
        flight_number: "SL101".to_string(),
        departure_airport: airport("JFK", "New York"),
        arrival_airport: airport("LAX", "Los Angeles"),
        departure_time: Utc::now() + chrono::Duration::days(7),
        arrival_time: Utc::now() + chrono::Duration::days(7) + chrono::Duration::hours(6),
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

fn service(store: &Arc<InMemoryStore>) -> BookingService {
    BookingService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(MockPaymentProvider::new()),
        RedirectUrls {
            return_url: "http://localhost:3000/payment/success/".to_string(),
            cancel_url: "http://localhost:3000/payment/cancel/".to_string(),
        },
    )
}

fn completed_webhook(order_id: &str) -> serde_json::Value {
    serde_json::json!({
        "event_type": "PAYMENT.SALE.COMPLETED",
        "resource": { "parent_payment": order_id },
    })
}

fn refunded_webhook(order_id: &str) -> serde_json::Value {
    serde_json::json!({
        "event_type": "PAYMENT.SALE.REFUNDED",
        "resource": { "parent_payment": order_id },
    })
}

#[tokio::test]
async fn test_booking_total_is_exact() {
    let store = Arc::new(InMemoryStore::new());
    let f = flight(5, 19999);
    store.insert_flight(f.clone()).await;
    let svc = service(&store);

    let booking = svc
        .create_booking("user-1", f.id, passengers(3))
        .await
        .unwrap();
    assert_eq!(booking.total_amount, Money::new(59997, "USD"));
    assert_eq!(booking.status, BookingStatus::PendingPayment);
}

#[tokio::test]
async fn test_overbooking_rejected_without_side_effects() {
    let store = Arc::new(InMemoryStore::new());
    let f = flight(2, 20000);
    store.insert_flight(f.clone()).await;
    let svc = service(&store);

    let err = svc
        .create_booking("user-1", f.id, passengers(3))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InsufficientSeats { .. }));

    assert!(svc.list_bookings("user-1").await.unwrap().is_empty());
    assert_eq!(
        store.get_flight(f.id).await.unwrap().unwrap().available_seats,
        2
    );
}

#[tokio::test]
async fn test_end_to_end_book_pay_execute() {
    let store = Arc::new(InMemoryStore::new());
    let f = flight(3, 20000);
    store.insert_flight(f.clone()).await;
    let svc = service(&store);

    // Book 2 passengers on a 200.00 flight with 3 seats.
    let booking = svc
        .create_booking("user-1", f.id, passengers(2))
        .await
        .unwrap();
    assert_eq!(booking.total_amount.to_decimal_string(), "400.00");
    assert_eq!(booking.status, BookingStatus::PendingPayment);
    assert_eq!(
        store.get_flight(f.id).await.unwrap().unwrap().available_seats,
        3
    );

    // Create the payment session.
    let receipt = svc
        .create_payment_session("user-1", &booking.reference)
        .await
        .unwrap();
    assert_eq!(receipt.amount, booking.total_amount);
    assert!(receipt.approval_url.starts_with("https://"));
    let payment = store
        .get_payment_by_order_id(&receipt.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);

    // Execute with an approving payer.
    let executed = svc
        .execute_payment(&receipt.order_id, "PAYER-42")
        .await
        .unwrap();
    assert_eq!(executed.booking_status, BookingStatus::Confirmed);
    assert_eq!(executed.payment_status, PaymentStatus::Completed);
    assert_eq!(
        store.get_flight(f.id).await.unwrap().unwrap().available_seats,
        1
    );
    let payment = store
        .get_payment_by_order_id(&receipt.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.payer_id.as_deref(), Some("PAYER-42"));
}

#[tokio::test]
async fn test_session_requires_payable_booking() {
    let store = Arc::new(InMemoryStore::new());
    let f = flight(3, 20000);
    store.insert_flight(f.clone()).await;
    let svc = service(&store);

    let booking = svc
        .create_booking("user-1", f.id, passengers(1))
        .await
        .unwrap();
    let receipt = svc
        .create_payment_session("user-1", &booking.reference)
        .await
        .unwrap();
    svc.execute_payment(&receipt.order_id, "PAYER-1")
        .await
        .unwrap();

    // Confirmed bookings cannot open another session.
    let err = svc
        .create_payment_session("user-1", &booking.reference)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::BookingNotPayable { .. }));
}

#[tokio::test]
async fn test_declined_execute_changes_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let f = flight(3, 20000);
    store.insert_flight(f.clone()).await;
    let svc = service(&store);

    let booking = svc
        .create_booking("user-1", f.id, passengers(2))
        .await
        .unwrap();
    let receipt = svc
        .create_payment_session("user-1", &booking.reference)
        .await
        .unwrap();

    let err = svc
        .execute_payment(&receipt.order_id, "DECLINE")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::ProviderDeclined(_)));

    let payment = store
        .get_payment_by_order_id(&receipt.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    let booking = svc.get_booking("user-1", &booking.reference).await.unwrap();
    assert_eq!(booking.status, BookingStatus::PendingPayment);
    assert_eq!(
        store.get_flight(f.id).await.unwrap().unwrap().available_seats,
        3
    );
}

#[tokio::test]
async fn test_provider_timeout_is_distinct_error() {
    let store = Arc::new(InMemoryStore::new());
    let f = flight(3, 20000);
    store.insert_flight(f.clone()).await;
    let svc = service(&store);

    let booking = svc
        .create_booking("user-1", f.id, passengers(1))
        .await
        .unwrap();
    let receipt = svc
        .create_payment_session("user-1", &booking.reference)
        .await
        .unwrap();

    let err = svc
        .execute_payment(&receipt.order_id, "TIMEOUT")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::ProviderUnavailable(_)));
}

#[tokio::test]
async fn test_webhook_completed_is_idempotent() {
    let store = Arc::new(InMemoryStore::new());
    let f = flight(3, 20000);
    store.insert_flight(f.clone()).await;
    let svc = service(&store);

    let booking = svc
        .create_booking("user-1", f.id, passengers(2))
        .await
        .unwrap();
    let receipt = svc
        .create_payment_session("user-1", &booking.reference)
        .await
        .unwrap();

    let first = svc
        .handle_provider_webhook(None, completed_webhook(&receipt.order_id))
        .await;
    assert_eq!(first, WebhookDisposition::Applied);
    assert_eq!(
        store.get_flight(f.id).await.unwrap().unwrap().available_seats,
        1
    );

    // The identical delivery again: no state change, no double decrement.
    let second = svc
        .handle_provider_webhook(None, completed_webhook(&receipt.order_id))
        .await;
    assert_eq!(second, WebhookDisposition::AlreadyApplied);
    assert_eq!(
        store.get_flight(f.id).await.unwrap().unwrap().available_seats,
        1
    );
    let booking = svc.get_booking("user-1", &booking.reference).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_refund_after_capture_cancels_and_releases() {
    let store = Arc::new(InMemoryStore::new());
    let f = flight(3, 20000);
    store.insert_flight(f.clone()).await;
    let svc = service(&store);

    let booking = svc
        .create_booking("user-1", f.id, passengers(2))
        .await
        .unwrap();
    let receipt = svc
        .create_payment_session("user-1", &booking.reference)
        .await
        .unwrap();
    svc.execute_payment(&receipt.order_id, "PAYER-1")
        .await
        .unwrap();
    assert_eq!(
        store.get_flight(f.id).await.unwrap().unwrap().available_seats,
        1
    );

    let refunded = svc
        .handle_provider_webhook(None, refunded_webhook(&receipt.order_id))
        .await;
    assert_eq!(refunded, WebhookDisposition::Applied);

    let booking = svc.get_booking("user-1", &booking.reference).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
    let payment = store
        .get_payment_by_order_id(&receipt.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Refunded);
    // Seats return to the pool.
    assert_eq!(
        store.get_flight(f.id).await.unwrap().unwrap().available_seats,
        3
    );
}

#[tokio::test]
async fn test_completed_after_refund_does_not_revert() {
    let store = Arc::new(InMemoryStore::new());
    let f = flight(3, 20000);
    store.insert_flight(f.clone()).await;
    let svc = service(&store);

    let booking = svc
        .create_booking("user-1", f.id, passengers(1))
        .await
        .unwrap();
    let receipt = svc
        .create_payment_session("user-1", &booking.reference)
        .await
        .unwrap();

    svc.handle_provider_webhook(None, refunded_webhook(&receipt.order_id))
        .await;
    let booking = svc.get_booking("user-1", &booking.reference).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);

    // A late (out-of-order) completed event must not resurrect it.
    let late = svc
        .handle_provider_webhook(None, completed_webhook(&receipt.order_id))
        .await;
    assert_eq!(late, WebhookDisposition::Ignored);
    let booking = svc.get_booking("user-1", &booking.reference).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
    let payment = store
        .get_payment_by_order_id(&receipt.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn test_execute_after_refund_is_refused() {
    let store = Arc::new(InMemoryStore::new());
    let f = flight(3, 20000);
    store.insert_flight(f.clone()).await;
    let svc = service(&store);

    let booking = svc
        .create_booking("user-1", f.id, passengers(1))
        .await
        .unwrap();
    let receipt = svc
        .create_payment_session("user-1", &booking.reference)
        .await
        .unwrap();

    // The refund webhook lands before the payer's browser redirect.
    let refunded = svc
        .handle_provider_webhook(None, refunded_webhook(&receipt.order_id))
        .await;
    assert_eq!(refunded, WebhookDisposition::Applied);

    let err = svc
        .execute_payment(&receipt.order_id, "PAYER-1")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::BookingNotPayable { .. }));

    // The late execute changed nothing.
    let booking = svc.get_booking("user-1", &booking.reference).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
    let payment = store
        .get_payment_by_order_id(&receipt.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Refunded);
    assert!(payment.payer_id.is_none());
    assert_eq!(
        store.get_flight(f.id).await.unwrap().unwrap().available_seats,
        3
    );
}

#[tokio::test]
async fn test_webhook_for_unknown_order_is_logged_noop() {
    let store = Arc::new(InMemoryStore::new());
    let svc = service(&store);

    let disposition = svc
        .handle_provider_webhook(None, completed_webhook("PAY-DOES-NOT-EXIST"))
        .await;
    assert_eq!(disposition, WebhookDisposition::Ignored);

    // Audited even though nothing happened.
    let log = store.list().await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].event_type, "PAYMENT.SALE.COMPLETED");
}

#[tokio::test]
async fn test_unverifiable_webhook_is_logged_not_applied() {
    let store = Arc::new(InMemoryStore::new());
    let f = flight(3, 20000);
    store.insert_flight(f.clone()).await;
    let svc = service(&store);

    let booking = svc
        .create_booking("user-1", f.id, passengers(1))
        .await
        .unwrap();
    let receipt = svc
        .create_payment_session("user-1", &booking.reference)
        .await
        .unwrap();

    let bad_headers = WebhookHeaders {
        transmission_id: "t-1".to_string(),
        transmission_time: "2026-01-01T00:00:00Z".to_string(),
        transmission_sig: "forged".to_string(),
        cert_url: "https://provider.test/cert".to_string(),
        auth_algo: "SHA256withRSA".to_string(),
    };
    let disposition = svc
        .handle_provider_webhook(Some(&bad_headers), completed_webhook(&receipt.order_id))
        .await;
    assert_eq!(disposition, WebhookDisposition::Ignored);

    // Logged, but no state was trusted from it.
    assert_eq!(store.list().await.unwrap().len(), 1);
    let payment = store
        .get_payment_by_order_id(&receipt.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_concurrent_creates_never_oversell() {
    let store = Arc::new(InMemoryStore::new());
    let f = flight(5, 20000);
    store.insert_flight(f.clone()).await;
    let svc = Arc::new(service(&store));

    let mut handles = Vec::new();
    for i in 0..8 {
        let svc = svc.clone();
        let flight_id = f.id;
        handles.push(tokio::spawn(async move {
            svc.create_booking(&format!("user-{}", i), flight_id, passengers(1))
                .await
        }));
    }

    let mut ok = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(LifecycleError::InsufficientSeats { .. }) => insufficient += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    // Exactly the 5 available seats were granted.
    assert_eq!(ok, 5);
    assert_eq!(insufficient, 3);
    // No confirmation happened yet, so available_seats is untouched.
    assert_eq!(
        store.get_flight(f.id).await.unwrap().unwrap().available_seats,
        5
    );
}
