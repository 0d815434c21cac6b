//! Subscription checkout orchestration: initial subscription, plan change
//! and cancellation against the payment provider, with a pending local
//! record created up front for the webhooks to reconcile later.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::{
        main_service::{MainServicePort, MainServiceUser},
        payment_provider::PaymentProviderPort,
    },
    application::use_cases::payments::{CreatePaymentInput, PaymentRepo},
    application::use_cases::webhooks::{
        META_APP_USER_ID, META_FLOW, META_PLAN_ID, META_WEBSITE_ID,
    },
    domain::entities::payment::{CheckoutFlow, PaymentKind, PaymentStatus},
};

/// What the frontend needs to finish a subscription checkout with Stripe.js.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub subscription_id: String,
    pub client_secret: Option<String>,
    pub payment_id: Uuid,
}

pub struct SubscriptionUseCases {
    provider: Arc<dyn PaymentProviderPort>,
    main_service: Arc<dyn MainServicePort>,
    payments: Arc<dyn PaymentRepo>,
}

impl SubscriptionUseCases {
    pub fn new(
        provider: Arc<dyn PaymentProviderPort>,
        main_service: Arc<dyn MainServicePort>,
        payments: Arc<dyn PaymentRepo>,
    ) -> Self {
        Self {
            provider,
            main_service,
            payments,
        }
    }

    /// Starts an initial subscription checkout. Lazily creates the Stripe
    /// customer on first use and persists the reference back to the main
    /// service before touching any subscription state.
    pub async fn create_subscription(
        &self,
        user_id: &str,
        website_id: &str,
        plan_id: &str,
        auth_token: &str,
    ) -> AppResult<CheckoutSession> {
        let user = self.main_service.get_user(user_id, auth_token).await?;
        let customer_id = self.ensure_customer(&user, auth_token).await?;

        let plan = self.main_service.get_plan(plan_id).await?;
        let Some(price_id) = plan.stripe_price_id.clone() else {
            return Err(AppError::Internal(format!(
                "Plan {} has no Stripe price configured",
                plan.id
            )));
        };

        let metadata = subscription_metadata(
            user_id,
            website_id,
            plan_id,
            CheckoutFlow::InitialSubscription,
        );
        let subscription = self
            .provider
            .create_subscription(&customer_id, &price_id, &metadata)
            .await?;

        let record = self
            .payments
            .create(&CreatePaymentInput {
                user_id: user_id.to_string(),
                website_id: website_id.to_string(),
                kind: PaymentKind::Subscription,
                amount_cents: plan.price_monthly_cents(),
                currency: subscription
                    .currency
                    .clone()
                    .unwrap_or_else(|| "usd".to_string()),
                description: Some(format!("Subscription to plan {}", plan.name)),
                status: PaymentStatus::Pending,
                stripe_payment_intent_id: None,
                stripe_subscription_id: Some(subscription.id.clone()),
            })
            .await?;

        info!(
            user_id,
            website_id,
            plan_id,
            subscription_id = %subscription.id,
            payment_id = %record.id,
            "Subscription checkout started"
        );

        Ok(CheckoutSession {
            subscription_id: subscription.id,
            client_secret: subscription.client_secret,
            payment_id: record.id,
        })
    }

    /// Moves the user to a new plan. The old subscription (when supplied) is
    /// canceled before the replacement is created; a cancel error other than
    /// "already gone" aborts the whole operation so the user is never left
    /// paying twice.
    pub async fn change_plan(
        &self,
        user_id: &str,
        website_id: &str,
        new_plan_id: &str,
        old_subscription_id: Option<&str>,
        auth_token: &str,
    ) -> AppResult<CheckoutSession> {
        let user = self.main_service.get_user(user_id, auth_token).await?;
        let Some(customer_id) = user.stripe_customer_id.clone() else {
            return Err(AppError::InvalidInput(
                "User has no payment customer; nothing to change".to_string(),
            ));
        };

        let plan = self.main_service.get_plan(new_plan_id).await?;
        let Some(price_id) = plan.stripe_price_id.clone() else {
            return Err(AppError::NotFound);
        };

        if let Some(old_id) = old_subscription_id {
            self.cancel_owned_subscription(old_id, &customer_id, user_id)
                .await?;
        } else {
            info!(user_id, "No old subscription supplied; skipping cancellation");
        }

        let metadata =
            subscription_metadata(user_id, website_id, new_plan_id, CheckoutFlow::PlanChange);
        let replacement = self
            .provider
            .create_subscription(&customer_id, &price_id, &metadata)
            .await?;

        let record = self
            .payments
            .create(&CreatePaymentInput {
                user_id: user_id.to_string(),
                website_id: website_id.to_string(),
                kind: PaymentKind::Subscription,
                amount_cents: plan.price_monthly_cents(),
                currency: replacement
                    .currency
                    .clone()
                    .unwrap_or_else(|| "usd".to_string()),
                description: Some(format!("Plan change to {}", plan.name)),
                status: PaymentStatus::Pending,
                stripe_payment_intent_id: None,
                stripe_subscription_id: Some(replacement.id.clone()),
            })
            .await?;

        info!(
            user_id,
            website_id,
            new_plan_id,
            old_subscription_id = ?old_subscription_id,
            new_subscription_id = %replacement.id,
            payment_id = %record.id,
            "Plan change checkout started"
        );

        Ok(CheckoutSession {
            subscription_id: replacement.id,
            client_secret: replacement.client_secret,
            payment_id: record.id,
        })
    }

    /// Cancels a subscription the caller owns. Idempotent: a subscription
    /// already gone on the provider side still resolves to success, and the
    /// local record (when present) is marked canceled either way.
    pub async fn cancel_subscription(
        &self,
        user_id: &str,
        subscription_id: &str,
        auth_token: &str,
    ) -> AppResult<()> {
        let user = self.main_service.get_user(user_id, auth_token).await?;
        let Some(customer_id) = user.stripe_customer_id.clone() else {
            return Err(AppError::InvalidInput(
                "User has no payment customer; nothing to cancel".to_string(),
            ));
        };

        self.cancel_owned_subscription(subscription_id, &customer_id, user_id)
            .await?;

        if let Some(record) = self.payments.find_by_subscription_id(subscription_id).await? {
            self.payments
                .update_status(record.id, PaymentStatus::Canceled)
                .await?;
        }

        info!(user_id, subscription_id, "Subscription canceled");
        Ok(())
    }

    /// Ownership-checked idempotent cancel. "Already gone" at either the
    /// fetch or the cancel counts as success.
    async fn cancel_owned_subscription(
        &self,
        subscription_id: &str,
        customer_id: &str,
        user_id: &str,
    ) -> AppResult<()> {
        match self.provider.get_subscription(subscription_id).await {
            Ok(subscription) => {
                if subscription.customer_id != customer_id {
                    warn!(
                        user_id,
                        subscription_id,
                        "Cancel rejected: subscription belongs to another customer"
                    );
                    return Err(AppError::Forbidden);
                }
                match self.provider.cancel_subscription(subscription_id).await {
                    Ok(()) | Err(AppError::NotFound) => Ok(()),
                    Err(e) => Err(e),
                }
            }
            Err(AppError::NotFound) => {
                info!(subscription_id, "Subscription already gone; treating cancel as success");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn ensure_customer(
        &self,
        user: &MainServiceUser,
        auth_token: &str,
    ) -> AppResult<String> {
        if let Some(customer_id) = user.stripe_customer_id.clone() {
            return Ok(customer_id);
        }

        let customer = self.provider.create_customer(&user.email, &user.id).await?;
        self.main_service
            .set_stripe_customer_id(&user.id, &customer.id, auth_token)
            .await?;
        info!(user_id = %user.id, customer_id = %customer.id, "Created payment customer for user");
        Ok(customer.id)
    }
}

fn subscription_metadata(
    user_id: &str,
    website_id: &str,
    plan_id: &str,
    flow: CheckoutFlow,
) -> HashMap<String, String> {
    HashMap::from([
        (META_APP_USER_ID.to_string(), user_id.to_string()),
        (META_WEBSITE_ID.to_string(), website_id.to_string()),
        (META_PLAN_ID.to_string(), plan_id.to_string()),
        (META_FLOW.to_string(), flow.as_metadata_value().to_string()),
    ])
}
