//! Stripe REST client (form-encoded, no SDK) plus webhook signature
//! verification.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::{
        PaymentProviderPort, ProviderCustomer, ProviderPaymentIntent, ProviderSubscription,
    },
    infra::http_client::build_client,
};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
}

impl StripeClient {
    pub fn new(secret_key: SecretString) -> Self {
        Self {
            client: build_client(),
            secret_key,
        }
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.secret_key.expose_secret()));
        format!("Basic {}", encoded)
    }

    // ========================================================================
    // Webhook Signature Verification
    // ========================================================================

    pub fn verify_webhook_signature(
        payload: &str,
        signature_header: &str,
        webhook_secret: &str,
    ) -> AppResult<()> {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        // Parse signature header: "t=timestamp,v1=signature,..."
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            let kv: Vec<&str> = part.splitn(2, '=').collect();
            if kv.len() != 2 {
                continue;
            }
            match kv[0] {
                "t" => timestamp = Some(kv[1]),
                "v1" => signatures.push(kv[1]),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| AppError::InvalidInput("Missing timestamp in signature".into()))?;

        if signatures.is_empty() {
            return Err(AppError::InvalidInput("Missing signature".into()));
        }

        let signed_payload = format!("{}.{}", timestamp, payload);
        let mut mac = Hmac::<Sha256>::new_from_slice(webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal("HMAC error".into()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        for sig in signatures {
            if constant_time_compare(sig, &expected) {
                // 5 minute tolerance against replay
                let ts: i64 = timestamp
                    .parse()
                    .map_err(|_| AppError::InvalidInput("Invalid timestamp".into()))?;
                let now = chrono::Utc::now().timestamp();
                if (now - ts).abs() > 300 {
                    return Err(AppError::InvalidInput("Timestamp too old".into()));
                }
                return Ok(());
            }
        }

        Err(AppError::InvalidInput("Invalid signature".into()))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Stripe API error");

            if let Ok(error) = serde_json::from_str::<StripeErrorResponse>(&body) {
                // Missing resources get their own variant so callers can
                // treat "already gone" as a non-error.
                if error.error.code.as_deref() == Some("resource_missing") {
                    return Err(AppError::NotFound);
                }
                return Err(AppError::PaymentProvider(
                    error.error.message.unwrap_or(error.error.error_type),
                ));
            }

            return Err(AppError::PaymentProvider(format!(
                "Stripe API error: {} - {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse Stripe response");
            AppError::PaymentProvider(format!("Failed to parse Stripe response: {}", e))
        })
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> AppResult<T> {
        let response = self
            .client
            .post(format!("{}{}", STRIPE_API_BASE, path))
            .header("Authorization", self.auth_header())
            .form(params)
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }
}

#[async_trait]
impl PaymentProviderPort for StripeClient {
    async fn create_customer(&self, email: &str, app_user_id: &str) -> AppResult<ProviderCustomer> {
        let params = vec![
            ("email".to_string(), email.to_string()),
            ("metadata[appUserId]".to_string(), app_user_id.to_string()),
        ];

        let customer: StripeCustomer = self.post_form("/customers", &params).await?;
        Ok(ProviderCustomer {
            id: customer.id,
            email: customer.email,
        })
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        metadata: &HashMap<String, String>,
    ) -> AppResult<ProviderSubscription> {
        // default_incomplete leaves the subscription unpaid until the caller
        // confirms the first invoice's payment intent with the client secret.
        let mut params: Vec<(String, String)> = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("items[0][price]".to_string(), price_id.to_string()),
            (
                "payment_behavior".to_string(),
                "default_incomplete".to_string(),
            ),
            (
                "expand[]".to_string(),
                "latest_invoice.payment_intent".to_string(),
            ),
        ];
        for (key, value) in metadata {
            params.push((format!("metadata[{}]", key), value.clone()));
        }

        let subscription: StripeSubscription = self.post_form("/subscriptions", &params).await?;
        Ok(subscription.into())
    }

    async fn get_subscription(&self, subscription_id: &str) -> AppResult<ProviderSubscription> {
        let response = self
            .client
            .get(format!(
                "{}/subscriptions/{}",
                STRIPE_API_BASE, subscription_id
            ))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("Stripe request failed: {}", e)))?;

        let subscription: StripeSubscription = self.handle_response(response).await?;
        Ok(subscription.into())
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> AppResult<()> {
        let response = self
            .client
            .delete(format!(
                "{}/subscriptions/{}",
                STRIPE_API_BASE, subscription_id
            ))
            .header("Authorization", self.auth_header())
            .form(cancel_params())
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("Stripe request failed: {}", e)))?;

        let _: StripeSubscription = self.handle_response(response).await?;
        Ok(())
    }

    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> AppResult<ProviderPaymentIntent> {
        let mut params: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_cents.to_string()),
            ("currency".to_string(), currency.to_lowercase()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        for (key, value) in metadata {
            params.push((format!("metadata[{}]", key), value.clone()));
        }

        let intent: StripePaymentIntent = self.post_form("/payment_intents", &params).await?;
        Ok(ProviderPaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
        })
    }
}

/// Cancellation immediately invoices any pending prorations instead of
/// leaving them for the next billing cycle of a subscription that no longer
/// exists.
fn cancel_params() -> &'static [(&'static str, &'static str)] {
    &[("invoice_now", "true")]
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

// ============================================================================
// Stripe Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    customer: String,
    status: String,
    currency: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    /// Expanded only on creation; a string id or absent on plain fetches.
    latest_invoice: Option<serde_json::Value>,
}

impl From<StripeSubscription> for ProviderSubscription {
    fn from(s: StripeSubscription) -> Self {
        let client_secret = s
            .latest_invoice
            .as_ref()
            .and_then(|inv| inv.pointer("/payment_intent/client_secret"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        ProviderSubscription {
            id: s.id,
            customer_id: s.customer,
            status: s.status,
            currency: s.currency,
            client_secret,
            metadata: s.metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(rename = "type")]
    error_type: String,
    message: Option<String>,
    code: Option<String>,
}
