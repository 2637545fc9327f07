use crate::money::Money;
use async_trait::async_trait;

/// Provider-assigned handle for a created payment session.
#[derive(Debug, Clone)]
pub struct PaymentSession {
    pub order_id: String,
    pub approval_url: String,
}

/// Signature headers the provider attaches to webhook deliveries.
#[derive(Debug, Clone)]
pub struct WebhookHeaders {
    pub transmission_id: String,
    pub transmission_time: String,
    pub transmission_sig: String,
    pub cert_url: String,
    pub auth_algo: String,
}

/// Failures from the external payment provider. A rejected payment and
/// an unreachable provider are distinct kinds; callers must not conflate
/// a timeout with a decline.
#[derive(Debug, thiserror::Error)]
pub enum ProviderFailure {
    #[error("provider rejected the request: {0}")]
    Declined(String),

    #[error("provider unreachable: {0}")]
    Unavailable(String),
}

impl From<ProviderFailure> for crate::error::LifecycleError {
    fn from(err: ProviderFailure) -> Self {
        match err {
            ProviderFailure::Declined(msg) => crate::error::LifecycleError::ProviderDeclined(msg),
            ProviderFailure::Unavailable(msg) => {
                crate::error::LifecycleError::ProviderUnavailable(msg)
            }
        }
    }
}

/// Adapter over the external payment provider's REST surface.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a payment session; returns the provider order id and the
    /// URL the payer is redirected to for approval.
    async fn create_payment(
        &self,
        amount: &Money,
        description: &str,
        custom: &serde_json::Value,
        return_url: &str,
        cancel_url: &str,
    ) -> Result<PaymentSession, ProviderFailure>;

    /// Finalize an approved payment.
    async fn execute_payment(&self, order_id: &str, payer_id: &str)
        -> Result<(), ProviderFailure>;

    /// Check the authenticity of an inbound webhook delivery.
    async fn verify_webhook(
        &self,
        headers: &WebhookHeaders,
        payload: &serde_json::Value,
    ) -> Result<bool, ProviderFailure>;
}
