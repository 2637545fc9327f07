use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::Deserialize;
use serde_json::json;
use skylane_booking::{ExecuteReceipt, PaymentSessionReceipt};
use skylane_core::provider::WebhookHeaders;

use crate::{auth::authenticate, error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
struct CreatePaymentRequest {
    booking_reference: String,
}

#[derive(Debug, Deserialize)]
struct ExecutePaymentRequest {
    order_id: String,
    payer_id: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/payments/paypal/create", post(create_payment))
        .route("/v1/payments/paypal/execute", post(execute_payment))
        .route("/v1/webhooks/paypal", post(paypal_webhook))
}

async fn create_payment(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<PaymentSessionReceipt>, AppError> {
    let claims = authenticate(&state, &bearer)?;
    let receipt = state
        .service
        .create_payment_session(&claims.sub, &req.booking_reference)
        .await?;
    tracing::info!(
        "Payment session {} created for booking {}",
        receipt.order_id,
        receipt.booking_reference
    );
    Ok(Json(receipt))
}

async fn execute_payment(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(req): Json<ExecutePaymentRequest>,
) -> Result<Json<ExecuteReceipt>, AppError> {
    authenticate(&state, &bearer)?;
    let receipt = state
        .service
        .execute_payment(&req.order_id, &req.payer_id)
        .await?;
    tracing::info!(
        "Payment executed for booking {}: {}",
        receipt.booking_reference,
        receipt.payment_status
    );
    Ok(Json(receipt))
}

/// Provider notification endpoint. Always acknowledges with 200 so the
/// provider stops retrying; reconciliation outcomes are logged and
/// captured in the audit trail.
async fn paypal_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let verification = webhook_headers(&headers);
    let disposition = state
        .service
        .handle_provider_webhook(verification.as_ref(), payload)
        .await;
    tracing::info!("Webhook reconciled: {:?}", disposition);
    Json(json!({ "status": "received" }))
}

/// Collect the PayPal transmission headers. All five must be present
/// for signature verification to run; otherwise the event is handled
/// unverified per the configured policy.
fn webhook_headers(headers: &HeaderMap) -> Option<WebhookHeaders> {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Some(WebhookHeaders {
        transmission_id: get("paypal-transmission-id")?,
        transmission_time: get("paypal-transmission-time")?,
        transmission_sig: get("paypal-transmission-sig")?,
        cert_url: get("paypal-cert-url")?,
        auth_algo: get("paypal-auth-algo")?,
    })
}
