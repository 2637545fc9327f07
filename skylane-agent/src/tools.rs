use serde::{Deserialize, Serialize};
use serde_json::json;
use skylane_booking::BookingService;
use skylane_core::booking::Booking;
use skylane_core::error::LifecycleError;
use skylane_core::flight::{Flight, FlightQuery};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// The closed set of operations the conversational assistant may invoke.
/// The LLM is an external collaborator: it receives structured tool
/// results and never reaches into the lifecycle directly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentTool {
    SearchFlights,
    InitiateBooking,
    CreatePaymentSession,
    CheckBookingStatus,
    GetUserBookings,
}

impl AgentTool {
    pub const ALL: [AgentTool; 5] = [
        AgentTool::SearchFlights,
        AgentTool::InitiateBooking,
        AgentTool::CreatePaymentSession,
        AgentTool::CheckBookingStatus,
        AgentTool::GetUserBookings,
    ];

    /// Description surfaced to the model when tools are advertised.
    pub fn description(&self) -> &'static str {
        match self {
            AgentTool::SearchFlights => {
                "Search for available flights between cities or airports"
            }
            AgentTool::InitiateBooking => {
                "Start the booking process for a flight with passenger details"
            }
            AgentTool::CreatePaymentSession => {
                "Create a PayPal payment for a pending booking"
            }
            AgentTool::CheckBookingStatus => "Check the status of an existing booking",
            AgentTool::GetUserBookings => "Get all bookings for the current user",
        }
    }
}

/// A structured tool invocation from the model.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub tool: AgentTool,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// A structured result handed back to the model. Failures are data, not
/// transport errors; the assistant relays them conversationally.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub tool: AgentTool,
    pub ok: bool,
    pub output: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
enum AgentError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Explicit dispatch table: operation kind to handler over the booking
/// service. Replaces dynamic tool registration.
pub struct AgentDispatcher {
    service: Arc<BookingService>,
}

impl AgentDispatcher {
    pub fn new(service: Arc<BookingService>) -> Self {
        Self { service }
    }

    pub async fn dispatch(&self, user_id: &str, call: ToolCall) -> ToolResult {
        debug!("dispatching tool {:?} for user {}", call.tool, user_id);
        let result = match call.tool {
            AgentTool::SearchFlights => self.search_flights(&call.arguments).await,
            AgentTool::InitiateBooking => self.initiate_booking(user_id, &call.arguments).await,
            AgentTool::CreatePaymentSession => {
                self.create_payment_session(user_id, &call.arguments).await
            }
            AgentTool::CheckBookingStatus => {
                self.check_booking_status(user_id, &call.arguments).await
            }
            AgentTool::GetUserBookings => self.get_user_bookings(user_id).await,
        };

        match result {
            Ok(output) => ToolResult {
                tool: call.tool,
                ok: true,
                output,
            },
            Err(err) => ToolResult {
                tool: call.tool,
                ok: false,
                output: json!({ "error": err.to_string() }),
            },
        }
    }

    async fn search_flights(
        &self,
        arguments: &serde_json::Value,
    ) -> Result<serde_json::Value, AgentError> {
        let mut query: FlightQuery = serde_json::from_value(arguments.clone())
            .map_err(|e| AgentError::InvalidArguments(e.to_string()))?;

        // Free-text route shorthand: "new york to los angeles".
        if query.departure.is_none() && query.arrival.is_none() {
            if let Some(free_text) = arguments["query"].as_str() {
                let lowered = free_text.to_lowercase();
                if let Some((from, to)) = lowered.split_once(" to ") {
                    query.departure = Some(from.trim().to_string());
                    query.arrival = Some(to.trim().to_string());
                }
            }
        }

        let flights = self.service.search_flights(&query).await?;
        let results: Vec<serde_json::Value> =
            flights.iter().take(15).map(flight_summary).collect();
        Ok(json!({ "flights": results, "count": results.len() }))
    }

    async fn initiate_booking(
        &self,
        user_id: &str,
        arguments: &serde_json::Value,
    ) -> Result<serde_json::Value, AgentError> {
        let flight_id = arguments["flight_id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                AgentError::InvalidArguments("flight_id must be a UUID".to_string())
            })?;
        let passengers = arguments["passengers"]
            .as_array()
            .cloned()
            .ok_or_else(|| {
                AgentError::InvalidArguments("passengers must be a list".to_string())
            })?;

        let booking = self
            .service
            .create_booking(user_id, flight_id, passengers)
            .await?;
        Ok(booking_summary(&booking))
    }

    async fn create_payment_session(
        &self,
        user_id: &str,
        arguments: &serde_json::Value,
    ) -> Result<serde_json::Value, AgentError> {
        let reference = reference_arg(arguments)?;
        let receipt = self
            .service
            .create_payment_session(user_id, &reference)
            .await?;
        Ok(json!({
            "booking_reference": receipt.booking_reference,
            "order_id": receipt.order_id,
            "approval_url": receipt.approval_url,
            "amount": receipt.amount.to_decimal_string(),
            "currency": receipt.amount.currency,
        }))
    }

    async fn check_booking_status(
        &self,
        user_id: &str,
        arguments: &serde_json::Value,
    ) -> Result<serde_json::Value, AgentError> {
        let reference = reference_arg(arguments)?;
        let booking = self.service.get_booking(user_id, &reference).await?;
        Ok(booking_summary(&booking))
    }

    async fn get_user_bookings(&self, user_id: &str) -> Result<serde_json::Value, AgentError> {
        let bookings = self.service.list_bookings(user_id).await?;
        let results: Vec<serde_json::Value> = bookings.iter().map(booking_summary).collect();
        Ok(json!({ "bookings": results, "count": results.len() }))
    }
}

fn reference_arg(arguments: &serde_json::Value) -> Result<String, AgentError> {
    arguments["booking_reference"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AgentError::InvalidArguments("booking_reference is required".to_string()))
}

fn flight_summary(flight: &Flight) -> serde_json::Value {
    json!({
        "flight_id": flight.id,
        "flight_number": flight.flight_number,
        "airline": flight.airline,
        "origin": flight.departure_airport.code,
        "destination": flight.arrival_airport.code,
        "departure_time": flight.departure_time.to_rfc3339(),
        "arrival_time": flight.arrival_time.to_rfc3339(),
        "duration": flight.duration_label(),
        "price": flight.price.to_decimal_string(),
        "currency": flight.price.currency,
        "available_seats": flight.available_seats,
    })
}

fn booking_summary(booking: &Booking) -> serde_json::Value {
    json!({
        "booking_reference": booking.reference,
        "status": booking.status,
        "flight_id": booking.flight_id,
        "passengers": booking.passenger_count(),
        "total_amount": booking.total_amount.to_decimal_string(),
        "currency": booking.total_amount.currency,
        "created_at": booking.created_at.to_rfc3339(),
    })
}
