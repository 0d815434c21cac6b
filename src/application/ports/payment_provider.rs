//! Port over the payment provider (Stripe) HTTP API.
//!
//! Business logic only ever talks to this trait; the concrete REST client
//! lives in `infra::stripe_client` and test doubles in `test_utils`.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::app_error::AppResult;

/// Provider-side customer, created once per user and persisted back to the
/// main service as the user's customer reference.
#[derive(Debug, Clone)]
pub struct ProviderCustomer {
    pub id: String,
    pub email: Option<String>,
}

/// Provider-side subscription as the reconciler needs to see it.
#[derive(Debug, Clone)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub currency: Option<String>,
    /// Client secret of the first invoice's payment intent. Present on
    /// freshly created `default_incomplete` subscriptions, absent on fetches.
    pub client_secret: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Provider-side one-time payment intent.
#[derive(Debug, Clone)]
pub struct ProviderPaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
}

/// Error contract: a missing remote resource (Stripe `resource_missing`)
/// surfaces as `AppError::NotFound` so callers can implement idempotent
/// cancellation; every other provider failure is `AppError::PaymentProvider`.
#[async_trait]
pub trait PaymentProviderPort: Send + Sync {
    async fn create_customer(
        &self,
        email: &str,
        app_user_id: &str,
    ) -> AppResult<ProviderCustomer>;

    /// Creates a subscription in `default_incomplete` mode so the caller can
    /// finish the payment with the returned client secret.
    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        metadata: &HashMap<String, String>,
    ) -> AppResult<ProviderSubscription>;

    async fn get_subscription(&self, subscription_id: &str) -> AppResult<ProviderSubscription>;

    /// Cancels immediately. Returns `AppError::NotFound` when the
    /// subscription no longer exists on the provider side.
    async fn cancel_subscription(&self, subscription_id: &str) -> AppResult<()>;

    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> AppResult<ProviderPaymentIntent>;
}
