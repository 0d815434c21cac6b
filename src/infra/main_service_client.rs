//! REST client for the main service, the system of record for users, plans
//! and website entitlements.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::main_service::{MainServicePort, MainServiceUser, PlanDetails},
    infra::http_client::build_client,
};

const AUTH_TOKEN_HEADER: &str = "x-auth-token";
const SERVICE_KEY_HEADER: &str = "x-payment-service-api-key";

#[derive(Clone)]
pub struct MainServiceClient {
    client: Client,
    base_url: String,
    service_api_key: SecretString,
}

impl MainServiceClient {
    pub fn new(base_url: &url::Url, service_api_key: SecretString) -> Self {
        Self {
            client: build_client(),
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            service_api_key,
        }
    }

    async fn handle_response<T: for<'de> serde::Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to read response: {}", e)))?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound);
        }
        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Main service error");
            return Err(AppError::Upstream(format!(
                "Main service returned {}",
                status
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse main service response");
            AppError::Upstream(format!("Failed to parse main service response: {}", e))
        })
    }

    async fn expect_success(&self, response: reqwest::Response) -> AppResult<()> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Main service error");
            return Err(AppError::Upstream(format!(
                "Main service returned {}",
                status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MainServicePort for MainServiceClient {
    async fn get_user(&self, user_id: &str, auth_token: &str) -> AppResult<MainServiceUser> {
        let response = self
            .client
            .get(format!("{}/users/{}", self.base_url, user_id))
            .header(AUTH_TOKEN_HEADER, auth_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Main service request failed: {}", e)))?;

        self.handle_response(response).await
    }

    async fn set_stripe_customer_id(
        &self,
        user_id: &str,
        stripe_customer_id: &str,
        auth_token: &str,
    ) -> AppResult<()> {
        let response = self
            .client
            .put(format!("{}/users/{}/customerId", self.base_url, user_id))
            .header(AUTH_TOKEN_HEADER, auth_token)
            .json(&customer_id_body(stripe_customer_id))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Main service request failed: {}", e)))?;

        self.expect_success(response).await
    }

    async fn get_plan(&self, plan_id: &str) -> AppResult<PlanDetails> {
        let response = self
            .client
            .get(format!("{}/plans/{}", self.base_url, plan_id))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Main service request failed: {}", e)))?;

        self.handle_response(response).await
    }

    async fn confirm_plan_change(
        &self,
        website_id: &str,
        new_plan_id: &str,
        new_stripe_subscription_id: &str,
        payment_id: Uuid,
    ) -> AppResult<()> {
        let response = self
            .client
            .put(format!(
                "{}/websites/{}/confirm-plan-change",
                self.base_url, website_id
            ))
            .header(SERVICE_KEY_HEADER, self.service_api_key.expose_secret())
            .json(&json!({
                "newPlanId": new_plan_id,
                "newStripeSubscriptionId": new_stripe_subscription_id,
                "paymentId": payment_id,
            }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Main service request failed: {}", e)))?;

        self.expect_success(response).await
    }

    async fn add_credits(
        &self,
        website_id: &str,
        tokens_to_add: i64,
        payment_id: Uuid,
    ) -> AppResult<()> {
        let response = self
            .client
            .put(format!(
                "{}/websites/{}/add-credits",
                self.base_url, website_id
            ))
            .header(SERVICE_KEY_HEADER, self.service_api_key.expose_secret())
            .json(&json!({
                "tokensToAdd": tokens_to_add,
                "paymentId": payment_id,
            }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Main service request failed: {}", e)))?;

        self.expect_success(response).await
    }
}

/// Body for `PUT /users/{id}/customerId`. The main service expects the full
/// `stripeCustomerId` key here, unlike the abbreviated `stripeCusId` field it
/// serves on user reads.
fn customer_id_body(stripe_customer_id: &str) -> serde_json::Value {
    json!({ "stripeCustomerId": stripe_customer_id })
}
