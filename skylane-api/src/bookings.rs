use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use skylane_core::booking::{Booking, BookingStatus};
use uuid::Uuid;

use crate::{auth::authenticate, error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    flight_id: Uuid,
    passengers: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct BookingView {
    booking_reference: String,
    status: BookingStatus,
    flight_id: Uuid,
    passengers: Vec<serde_json::Value>,
    total_amount: String,
    currency: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Booking> for BookingView {
    fn from(b: Booking) -> Self {
        BookingView {
            booking_reference: b.reference,
            status: b.status,
            flight_id: b.flight_id,
            passengers: b.passengers,
            total_amount: b.total_amount.to_decimal_string(),
            currency: b.total_amount.currency,
            created_at: b.created_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/{reference}", get(get_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<BookingView>, AppError> {
    let claims = authenticate(&state, &bearer)?;

    let booking = state
        .service
        .create_booking(&claims.sub, req.flight_id, req.passengers)
        .await?;

    tracing::info!("Booking created: {}", booking.reference);
    Ok(Json(BookingView::from(booking)))
}

async fn list_bookings(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    let claims = authenticate(&state, &bearer)?;
    let bookings = state.service.list_bookings(&claims.sub).await?;
    Ok(Json(bookings.into_iter().map(BookingView::from).collect()))
}

async fn get_booking(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Path(reference): Path<String>,
) -> Result<Json<BookingView>, AppError> {
    let claims = authenticate(&state, &bearer)?;
    let booking = state.service.get_booking(&claims.sub, &reference).await?;
    Ok(Json(BookingView::from(booking)))
}
