//! Port over the main service, the external system of record for users,
//! plans and website entitlements.

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_error::AppResult;

/// User profile as returned by `GET /users/{id}` on the main service.
#[derive(Debug, Clone, Deserialize)]
pub struct MainServiceUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    /// Stripe customer reference, absent until the first checkout.
    #[serde(rename = "stripeCusId")]
    pub stripe_customer_id: Option<String>,
}

/// Plan as returned by `GET /plans/{id}` on the main service.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanDetails {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    /// Monthly price in whole currency units.
    #[serde(rename = "priceMonthly")]
    pub price_monthly: f64,
    /// The Stripe price the main service mapped this plan to. A plan without
    /// one cannot be checked out.
    #[serde(rename = "stripePriceId")]
    pub stripe_price_id: Option<String>,
}

impl PlanDetails {
    pub fn price_monthly_cents(&self) -> i64 {
        (self.price_monthly * 100.0).round() as i64
    }
}

/// The confirmation endpoints (`confirm_plan_change`, `add_credits`) are
/// expected to be idempotent by (website id, payment id) on the main service
/// side; this service calls them at most once per event delivery.
#[async_trait]
pub trait MainServicePort: Send + Sync {
    /// Authenticated with the end user's forwarded auth token.
    async fn get_user(&self, user_id: &str, auth_token: &str) -> AppResult<MainServiceUser>;

    /// Persists a freshly created Stripe customer reference onto the user.
    async fn set_stripe_customer_id(
        &self,
        user_id: &str,
        stripe_customer_id: &str,
        auth_token: &str,
    ) -> AppResult<()>;

    async fn get_plan(&self, plan_id: &str) -> AppResult<PlanDetails>;

    /// Tells the main service a plan change (or initial subscription) has
    /// been paid for. Authenticated with the shared service key.
    async fn confirm_plan_change(
        &self,
        website_id: &str,
        new_plan_id: &str,
        new_stripe_subscription_id: &str,
        payment_id: Uuid,
    ) -> AppResult<()>;

    /// Credits a website with purchased tokens. Authenticated with the
    /// shared service key.
    async fn add_credits(
        &self,
        website_id: &str,
        tokens_to_add: i64,
        payment_id: Uuid,
    ) -> AppResult<()>;
}
