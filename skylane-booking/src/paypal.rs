use async_trait::async_trait;
use serde::Deserialize;
use skylane_core::money::Money;
use skylane_core::provider::{PaymentProvider, PaymentSession, ProviderFailure, WebhookHeaders};
use std::time::Duration;
use tracing::debug;

const SANDBOX_BASE: &str = "https://api-m.sandbox.paypal.com";
const LIVE_BASE: &str = "https://api-m.paypal.com";

/// PayPal REST client. Credentials are passed in at construction; no
/// process-wide configuration is read. All requests carry a bounded
/// timeout, and transport failures surface as `Unavailable`, distinct
/// from a rejected payment.
pub struct PayPalClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    /// Webhook id registered with PayPal; signature verification is a
    /// no-op when unset.
    webhook_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PaymentLink {
    rel: String,
    href: String,
}

#[derive(Debug, Deserialize)]
struct CreatePaymentResponse {
    id: String,
    #[serde(default)]
    links: Vec<PaymentLink>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    verification_status: String,
}

fn transport(err: reqwest::Error) -> ProviderFailure {
    ProviderFailure::Unavailable(err.to_string())
}

impl PayPalClient {
    pub fn new(
        mode: &str,
        client_id: String,
        client_secret: String,
        webhook_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderFailure> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport)?;
        let base_url = if mode == "live" { LIVE_BASE } else { SANDBOX_BASE }.to_string();
        Ok(Self {
            http,
            base_url,
            client_id,
            client_secret,
            webhook_id,
        })
    }

    async fn access_token(&self) -> Result<String, ProviderFailure> {
        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderFailure::Declined(format!(
                "token request failed ({}): {}",
                status, body
            )));
        }
        let token: TokenResponse = response.json().await.map_err(transport)?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl PaymentProvider for PayPalClient {
    async fn create_payment(
        &self,
        amount: &Money,
        description: &str,
        custom: &serde_json::Value,
        return_url: &str,
        cancel_url: &str,
    ) -> Result<PaymentSession, ProviderFailure> {
        let token = self.access_token().await?;

        let body = serde_json::json!({
            "intent": "sale",
            "payer": { "payment_method": "paypal" },
            "redirect_urls": {
                "return_url": return_url,
                "cancel_url": cancel_url,
            },
            "transactions": [{
                "amount": {
                    "total": amount.to_decimal_string(),
                    "currency": amount.currency,
                },
                "description": description,
                "custom": custom.to_string(),
            }],
        });

        let response = self
            .http
            .post(format!("{}/v1/payments/payment", self.base_url))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderFailure::Declined(format!("{}: {}", status, body)));
        }

        let created: CreatePaymentResponse = response.json().await.map_err(transport)?;
        let approval_url = created
            .links
            .into_iter()
            .find(|link| link.rel == "approval_url")
            .map(|link| link.href)
            .ok_or_else(|| {
                ProviderFailure::Declined("provider response carried no approval URL".to_string())
            })?;

        debug!("created provider payment {}", created.id);
        Ok(PaymentSession {
            order_id: created.id,
            approval_url,
        })
    }

    async fn execute_payment(
        &self,
        order_id: &str,
        payer_id: &str,
    ) -> Result<(), ProviderFailure> {
        let token = self.access_token().await?;

        let response = self
            .http
            .post(format!(
                "{}/v1/payments/payment/{}/execute",
                self.base_url, order_id
            ))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "payer_id": payer_id }))
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderFailure::Declined(format!("{}: {}", status, body)));
        }
        Ok(())
    }

    async fn verify_webhook(
        &self,
        headers: &WebhookHeaders,
        payload: &serde_json::Value,
    ) -> Result<bool, ProviderFailure> {
        let webhook_id = match &self.webhook_id {
            Some(id) => id,
            // Verification not configured; accept and rely on the audit log.
            None => return Ok(true),
        };
        let token = self.access_token().await?;

        let body = serde_json::json!({
            "auth_algo": headers.auth_algo,
            "cert_url": headers.cert_url,
            "transmission_id": headers.transmission_id,
            "transmission_sig": headers.transmission_sig,
            "transmission_time": headers.transmission_time,
            "webhook_id": webhook_id,
            "webhook_event": payload,
        });

        let response = self
            .http
            .post(format!(
                "{}/v1/notifications/verify-webhook-signature",
                self.base_url
            ))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderFailure::Declined(format!("{}: {}", status, body)));
        }
        let verdict: VerifyResponse = response.json().await.map_err(transport)?;
        Ok(verdict.verification_status == "SUCCESS")
    }
}
