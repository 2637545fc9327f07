use crate::money::Money;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airport {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub city: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub departure_airport: Airport,
    pub arrival_airport: Airport,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: Money,
    pub available_seats: i32,
    pub airline: String,
    pub aircraft_type: String,
    pub created_at: DateTime<Utc>,
}

impl Flight {
    /// Human-facing duration label, e.g. "2h 35m".
    pub fn duration_label(&self) -> String {
        let duration = self.arrival_time - self.departure_time;
        let minutes = duration.num_minutes().max(0);
        format!("{}h {}m", minutes / 60, minutes % 60)
    }
}

/// Search filters for the flight catalog. Departure/arrival match city
/// or airport code, case-insensitive substring.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlightQuery {
    pub departure: Option<String>,
    pub arrival: Option<String>,
    pub date: Option<NaiveDate>,
    pub passengers: Option<u32>,
}

impl FlightQuery {
    pub fn passenger_count(&self) -> u32 {
        self.passengers.unwrap_or(1).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn airport(code: &str, city: &str) -> Airport {
        Airport {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: format!("{} International", city),
            city: city.to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn test_duration_label() {
        let flight = Flight {
            id: Uuid::new_v4(),
            flight_number: "SL101".to_string(),
            departure_airport: airport("JFK", "New York"),
            arrival_airport: airport("LAX", "Los Angeles"),
            departure_time: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
            arrival_time: Utc.with_ymd_and_hms(2026, 3, 1, 10, 35, 0).unwrap(),
            price: Money::new(20000, "USD"),
            available_seats: 100,
            airline: "Skylane Air".to_string(),
            aircraft_type: "A320".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(flight.duration_label(), "2h 35m");
    }

    #[test]
    fn test_query_defaults_to_one_passenger() {
        let query = FlightQuery::default();
        assert_eq!(query.passenger_count(), 1);
    }
}
