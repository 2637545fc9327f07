use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use skylane_core::error::LifecycleError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    ValidationError(String),
    Lifecycle(LifecycleError),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Lifecycle(err) => lifecycle_response(err),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

fn lifecycle_response(err: LifecycleError) -> (StatusCode, String) {
    let status = match &err {
        LifecycleError::InvalidPassengerList => StatusCode::BAD_REQUEST,
        LifecycleError::InsufficientSeats { .. } => StatusCode::CONFLICT,
        LifecycleError::FlightNotFound(_)
        | LifecycleError::BookingNotFound(_)
        | LifecycleError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::BookingNotPayable { .. } => StatusCode::CONFLICT,
        LifecycleError::ProviderDeclined(_) => StatusCode::PAYMENT_REQUIRED,
        LifecycleError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
        LifecycleError::WebhookUnverified => StatusCode::BAD_REQUEST,
        LifecycleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Internal Server Error: {}", err);
        return (status, "Internal Server Error".to_string());
    }
    (status, err.to_string())
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        Self::Lifecycle(err)
    }
}
