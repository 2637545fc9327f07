use async_trait::async_trait;
use skylane_core::money::Money;
use skylane_core::provider::{PaymentProvider, PaymentSession, ProviderFailure, WebhookHeaders};
use std::sync::atomic::{AtomicU64, Ordering};

/// In-process provider stand-in for tests and local development.
///
/// Trigger values steer failure paths: a payer id of `"DECLINE"` makes
/// execute fail as a provider rejection, `"TIMEOUT"` as an unreachable
/// provider; a `{"simulate": "declined"}` custom field fails creation.
/// Webhook verification accepts `transmission_sig == "valid"`.
pub struct MockPaymentProvider {
    counter: AtomicU64,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for MockPaymentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_payment(
        &self,
        _amount: &Money,
        _description: &str,
        custom: &serde_json::Value,
        _return_url: &str,
        _cancel_url: &str,
    ) -> Result<PaymentSession, ProviderFailure> {
        if custom["simulate"].as_str() == Some("declined") {
            return Err(ProviderFailure::Declined(
                "simulated provider rejection".to_string(),
            ));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let order_id = format!("MOCK-{:06}", n);
        Ok(PaymentSession {
            approval_url: format!("https://provider.test/approve/{}", order_id),
            order_id,
        })
    }

    async fn execute_payment(
        &self,
        _order_id: &str,
        payer_id: &str,
    ) -> Result<(), ProviderFailure> {
        match payer_id {
            "DECLINE" => Err(ProviderFailure::Declined(
                "payment declined by provider".to_string(),
            )),
            "TIMEOUT" => Err(ProviderFailure::Unavailable(
                "simulated provider timeout".to_string(),
            )),
            _ => Ok(()),
        }
    }

    async fn verify_webhook(
        &self,
        headers: &WebhookHeaders,
        _payload: &serde_json::Value,
    ) -> Result<bool, ProviderFailure> {
        Ok(headers.transmission_sig == "valid")
    }
}
