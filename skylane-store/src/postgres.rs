use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skylane_core::booking::{Booking, BookingStatus};
use skylane_core::error::StoreError;
use skylane_core::flight::{Airport, Flight, FlightQuery};
use skylane_core::money::Money;
use skylane_core::payment::{Payment, PaymentMethod, PaymentStatus, PaymentTransition, WebhookLog};
use skylane_core::repository::{
    BookingStore, FlightStore, PaymentStore, SeatReservation, WebhookLogStore,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Postgres-backed store. The conditional seat update and the payment
/// status compare-and-swap are expressed as guarded UPDATEs so that
/// concurrent requests cannot oversell or double-apply.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPool::connect(url).await?;
        tracing::info!("connected to Postgres");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

fn map_err(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.to_string())
        }
        _ => StoreError::Unavailable(err.to_string()),
    }
}

fn booking_status_str(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::PendingPayment => "pending_payment",
        BookingStatus::Confirmed => "confirmed",
        BookingStatus::Cancelled => "cancelled",
        BookingStatus::Completed => "completed",
    }
}

fn parse_booking_status(s: &str) -> Result<BookingStatus, StoreError> {
    match s {
        "pending_payment" => Ok(BookingStatus::PendingPayment),
        "confirmed" => Ok(BookingStatus::Confirmed),
        "cancelled" => Ok(BookingStatus::Cancelled),
        "completed" => Ok(BookingStatus::Completed),
        other => Err(StoreError::Unavailable(format!(
            "unknown booking status in store: {}",
            other
        ))),
    }
}

fn payment_status_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "pending",
        PaymentStatus::Completed => "completed",
        PaymentStatus::Failed => "failed",
        PaymentStatus::Refunded => "refunded",
    }
}

fn parse_payment_status(s: &str) -> Result<PaymentStatus, StoreError> {
    match s {
        "pending" => Ok(PaymentStatus::Pending),
        "completed" => Ok(PaymentStatus::Completed),
        "failed" => Ok(PaymentStatus::Failed),
        "refunded" => Ok(PaymentStatus::Refunded),
        other => Err(StoreError::Unavailable(format!(
            "unknown payment status in store: {}",
            other
        ))),
    }
}

fn payment_method_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Paypal => "paypal",
        PaymentMethod::Stripe => "stripe",
        PaymentMethod::Card => "card",
    }
}

fn parse_payment_method(s: &str) -> Result<PaymentMethod, StoreError> {
    match s {
        "paypal" => Ok(PaymentMethod::Paypal),
        "stripe" => Ok(PaymentMethod::Stripe),
        "card" => Ok(PaymentMethod::Card),
        other => Err(StoreError::Unavailable(format!(
            "unknown payment method in store: {}",
            other
        ))),
    }
}

const FLIGHT_SELECT: &str = r#"
    SELECT f.id, f.flight_number, f.departure_time, f.arrival_time,
           f.price_minor, f.currency, f.available_seats, f.airline,
           f.aircraft_type, f.created_at,
           da.id AS da_id, da.code AS da_code, da.name AS da_name,
           da.city AS da_city, da.country AS da_country,
           aa.id AS aa_id, aa.code AS aa_code, aa.name AS aa_name,
           aa.city AS aa_city, aa.country AS aa_country
    FROM flights f
    JOIN airports da ON f.departure_airport = da.id
    JOIN airports aa ON f.arrival_airport = aa.id
"#;

fn row_to_flight(row: &PgRow) -> Result<Flight, StoreError> {
    let read = |e: sqlx::Error| StoreError::Unavailable(e.to_string());
    Ok(Flight {
        id: row.try_get("id").map_err(read)?,
        flight_number: row.try_get("flight_number").map_err(read)?,
        departure_airport: Airport {
            id: row.try_get("da_id").map_err(read)?,
            code: row.try_get("da_code").map_err(read)?,
            name: row.try_get("da_name").map_err(read)?,
            city: row.try_get("da_city").map_err(read)?,
            country: row.try_get("da_country").map_err(read)?,
        },
        arrival_airport: Airport {
            id: row.try_get("aa_id").map_err(read)?,
            code: row.try_get("aa_code").map_err(read)?,
            name: row.try_get("aa_name").map_err(read)?,
            city: row.try_get("aa_city").map_err(read)?,
            country: row.try_get("aa_country").map_err(read)?,
        },
        departure_time: row.try_get("departure_time").map_err(read)?,
        arrival_time: row.try_get("arrival_time").map_err(read)?,
        price: Money {
            amount_minor: row.try_get("price_minor").map_err(read)?,
            currency: row.try_get("currency").map_err(read)?,
        },
        available_seats: row.try_get("available_seats").map_err(read)?,
        airline: row.try_get("airline").map_err(read)?,
        aircraft_type: row.try_get("aircraft_type").map_err(read)?,
        created_at: row.try_get("created_at").map_err(read)?,
    })
}

fn row_to_booking(row: &PgRow) -> Result<Booking, StoreError> {
    let read = |e: sqlx::Error| StoreError::Unavailable(e.to_string());
    let status: String = row.try_get("status").map_err(read)?;
    let passengers: serde_json::Value = row.try_get("passengers").map_err(read)?;
    let passengers = passengers
        .as_array()
        .cloned()
        .unwrap_or_default();
    Ok(Booking {
        id: row.try_get("id").map_err(read)?,
        user_id: row.try_get("user_id").map_err(read)?,
        flight_id: row.try_get("flight_id").map_err(read)?,
        reference: row.try_get("reference").map_err(read)?,
        status: parse_booking_status(&status)?,
        passengers,
        total_amount: Money {
            amount_minor: row.try_get("total_minor").map_err(read)?,
            currency: row.try_get("currency").map_err(read)?,
        },
        created_at: row.try_get("created_at").map_err(read)?,
        updated_at: row.try_get("updated_at").map_err(read)?,
    })
}

fn row_to_payment(row: &PgRow) -> Result<Payment, StoreError> {
    let read = |e: sqlx::Error| StoreError::Unavailable(e.to_string());
    let status: String = row.try_get("status").map_err(read)?;
    let method: String = row.try_get("method").map_err(read)?;
    Ok(Payment {
        id: row.try_get("id").map_err(read)?,
        booking_id: row.try_get("booking_id").map_err(read)?,
        amount: Money {
            amount_minor: row.try_get("amount_minor").map_err(read)?,
            currency: row.try_get("currency").map_err(read)?,
        },
        method: parse_payment_method(&method)?,
        provider_order_id: row.try_get("provider_order_id").map_err(read)?,
        payer_id: row.try_get("payer_id").map_err(read)?,
        status: parse_payment_status(&status)?,
        created_at: row.try_get("created_at").map_err(read)?,
        updated_at: row.try_get("updated_at").map_err(read)?,
    })
}

#[async_trait]
impl FlightStore for PgStore {
    async fn get_flight(&self, id: Uuid) -> Result<Option<Flight>, StoreError> {
        let sql = format!("{} WHERE f.id = $1", FLIGHT_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_flight).transpose()
    }

    async fn list_airports(&self) -> Result<Vec<Airport>, StoreError> {
        let rows = sqlx::query("SELECT id, code, name, city, country FROM airports ORDER BY code")
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        let read = |e: sqlx::Error| StoreError::Unavailable(e.to_string());
        rows.iter()
            .map(|row| {
                Ok(Airport {
                    id: row.try_get("id").map_err(read)?,
                    code: row.try_get("code").map_err(read)?,
                    name: row.try_get("name").map_err(read)?,
                    city: row.try_get("city").map_err(read)?,
                    country: row.try_get("country").map_err(read)?,
                })
            })
            .collect()
    }

    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<Flight>, StoreError> {
        let sql = format!(
            r#"{}
            WHERE ($1::text IS NULL OR da.city ILIKE '%' || $1 || '%' OR da.code ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR aa.city ILIKE '%' || $2 || '%' OR aa.code ILIKE '%' || $2 || '%')
              AND ($3::date IS NULL OR (f.departure_time AT TIME ZONE 'UTC')::date = $3)
              AND f.available_seats - f.reserved_seats >= $4
            ORDER BY f.departure_time
            "#,
            FLIGHT_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(query.departure.as_deref())
            .bind(query.arrival.as_deref())
            .bind(query.date)
            .bind(query.passenger_count() as i32)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        rows.iter().map(row_to_flight).collect()
    }

    async fn try_reserve_seats(
        &self,
        flight_id: Uuid,
        count: u32,
    ) -> Result<SeatReservation, StoreError> {
        let result = sqlx::query(
            "UPDATE flights SET reserved_seats = reserved_seats + $2 \
             WHERE id = $1 AND available_seats - reserved_seats >= $2",
        )
        .bind(flight_id)
        .bind(count as i32)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        if result.rows_affected() == 1 {
            return Ok(SeatReservation::Reserved);
        }

        let row = sqlx::query(
            "SELECT available_seats - reserved_seats AS available FROM flights WHERE id = $1",
        )
        .bind(flight_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?
        .ok_or(StoreError::NotFound)?;

        let available: i32 = row
            .try_get("available")
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(SeatReservation::Insufficient { available })
    }

    async fn commit_seats(&self, flight_id: Uuid, count: u32) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE flights SET available_seats = available_seats - $2, \
             reserved_seats = reserved_seats - $2 \
             WHERE id = $1 AND available_seats >= $2 AND reserved_seats >= $2",
        )
        .bind(flight_id)
        .bind(count as i32)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(StoreError::Conflict(format!(
                "seat commit of {} rejected on flight {}",
                count, flight_id
            )))
        }
    }

    async fn release_seats(
        &self,
        flight_id: Uuid,
        count: u32,
        seats_committed: bool,
    ) -> Result<(), StoreError> {
        let sql = if seats_committed {
            "UPDATE flights SET available_seats = available_seats + $2 WHERE id = $1"
        } else {
            "UPDATE flights SET reserved_seats = GREATEST(reserved_seats - $2, 0) WHERE id = $1"
        };
        let result = sqlx::query(sql)
            .bind(flight_id)
            .bind(count as i32)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;

        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn create_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bookings
                (id, user_id, flight_id, reference, status, passengers,
                 total_minor, currency, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.user_id)
        .bind(booking.flight_id)
        .bind(&booking.reference)
        .bind(booking_status_str(booking.status))
        .bind(serde_json::Value::Array(booking.passengers.clone()))
        .bind(booking.total_amount.amount_minor)
        .bind(&booking.total_amount.currency)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_booking).transpose()
    }

    async fn get_booking_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query("SELECT * FROM bookings WHERE reference = $1")
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_booking).transpose()
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE bookings SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(booking_status_str(status))
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(map_err)?;
        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn list_bookings(&self, user_id: &str) -> Result<Vec<Booking>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM bookings WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(map_err)?;
        rows.iter().map(row_to_booking).collect()
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn create_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payments
                (id, booking_id, amount_minor, currency, method,
                 provider_order_id, payer_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(payment.amount.amount_minor)
        .bind(&payment.amount.currency)
        .bind(payment_method_str(payment.method))
        .bind(&payment.provider_order_id)
        .bind(payment.payer_id.as_deref())
        .bind(payment_status_str(payment.status))
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn get_payment_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query("SELECT * FROM payments WHERE provider_order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_payment).transpose()
    }

    async fn get_payment_by_booking_id(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query("SELECT * FROM payments WHERE booking_id = $1")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(row_to_payment).transpose()
    }

    async fn transition_payment(
        &self,
        order_id: &str,
        allowed_from: &[PaymentStatus],
        to: PaymentStatus,
        payer_id: Option<&str>,
    ) -> Result<PaymentTransition, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let row = sqlx::query("SELECT status FROM payments WHERE provider_order_id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_err)?
            .ok_or(StoreError::NotFound)?;

        let current: String = row
            .try_get("status")
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let current = parse_payment_status(&current)?;

        if current == to {
            tx.rollback().await.map_err(map_err)?;
            return Ok(PaymentTransition::AlreadyApplied);
        }
        if !allowed_from.contains(&current) {
            tx.rollback().await.map_err(map_err)?;
            return Ok(PaymentTransition::Rejected { current });
        }

        sqlx::query(
            "UPDATE payments SET status = $2, payer_id = COALESCE($3, payer_id), \
             updated_at = NOW() WHERE provider_order_id = $1",
        )
        .bind(order_id)
        .bind(payment_status_str(to))
        .bind(payer_id)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        tx.commit().await.map_err(map_err)?;
        Ok(PaymentTransition::Applied { previous: current })
    }
}

#[async_trait]
impl WebhookLogStore for PgStore {
    async fn append(&self, entry: &WebhookLog) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO webhook_log (id, event_type, payload, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(entry.id)
        .bind(&entry.event_type)
        .bind(&entry.payload)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WebhookLog>, StoreError> {
        let rows = sqlx::query("SELECT * FROM webhook_log ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        let read = |e: sqlx::Error| StoreError::Unavailable(e.to_string());
        rows.iter()
            .map(|row| {
                Ok(WebhookLog {
                    id: row.try_get("id").map_err(read)?,
                    event_type: row.try_get("event_type").map_err(read)?,
                    payload: row.try_get("payload").map_err(read)?,
                    created_at: row
                        .try_get::<DateTime<Utc>, _>("created_at")
                        .map_err(read)?,
                })
            })
            .collect()
    }
}
