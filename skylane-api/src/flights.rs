use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use skylane_core::flight::{Airport, Flight, FlightQuery};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Serialize)]
struct FlightView {
    id: Uuid,
    flight_number: String,
    airline: String,
    aircraft_type: String,
    departure_airport: Airport,
    arrival_airport: Airport,
    departure_time: chrono::DateTime<chrono::Utc>,
    arrival_time: chrono::DateTime<chrono::Utc>,
    duration: String,
    price: String,
    currency: String,
    available_seats: i32,
}

impl From<Flight> for FlightView {
    fn from(f: Flight) -> Self {
        let duration = f.duration_label();
        FlightView {
            id: f.id,
            flight_number: f.flight_number,
            airline: f.airline,
            aircraft_type: f.aircraft_type,
            duration,
            departure_airport: f.departure_airport,
            arrival_airport: f.arrival_airport,
            departure_time: f.departure_time,
            arrival_time: f.arrival_time,
            price: f.price.to_decimal_string(),
            currency: f.price.currency,
            available_seats: f.available_seats,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/airports", get(list_airports))
        .route("/v1/flights/search", get(search_flights))
        .route("/v1/flights/{id}", get(get_flight))
}

async fn list_airports(State(state): State<AppState>) -> Result<Json<Vec<Airport>>, AppError> {
    let airports = state.service.list_airports().await?;
    Ok(Json(airports))
}

async fn search_flights(
    State(state): State<AppState>,
    Query(query): Query<FlightQuery>,
) -> Result<Json<Vec<FlightView>>, AppError> {
    let flights = state.service.search_flights(&query).await?;
    Ok(Json(flights.into_iter().map(FlightView::from).collect()))
}

async fn get_flight(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FlightView>, AppError> {
    let flight = state.service.get_flight(id).await?;
    Ok(Json(FlightView::from(flight)))
}
