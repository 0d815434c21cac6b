use std::sync::Arc;

use crate::{
    application::use_cases::{
        payments::PaymentUseCases, subscriptions::SubscriptionUseCases,
        token_purchases::TokenPurchaseUseCases, webhooks::WebhookUseCases,
    },
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub token_purchase_use_cases: Arc<TokenPurchaseUseCases>,
    pub webhook_use_cases: Arc<WebhookUseCases>,
    pub payment_use_cases: Arc<PaymentUseCases>,
}
