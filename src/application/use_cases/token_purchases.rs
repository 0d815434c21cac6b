//! One-time token purchase checkout: converts a token amount into a charge,
//! opens a payment intent and tracks it as a pending record.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::PaymentProviderPort,
    application::use_cases::payments::{CreatePaymentInput, PaymentRepo},
    application::use_cases::webhooks::{META_TOKENS_AMOUNT, META_USER_ID, META_WEBSITE_ID},
    domain::entities::payment::{PaymentKind, PaymentStatus},
};

/// Stripe rejects charges below its per-currency minimum; 50 cents covers
/// every currency this service charges in.
const MIN_CHARGE_CENTS: i64 = 50;

const DEFAULT_PURCHASE_CURRENCY: &str = "usd";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPurchaseSession {
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub payment_id: Uuid,
    pub amount_cents: i64,
}

pub struct TokenPurchaseUseCases {
    provider: Arc<dyn PaymentProviderPort>,
    payments: Arc<dyn PaymentRepo>,
    /// Tokens per currency unit; price = tokens / coefficient.
    token_coefficient: f64,
}

impl TokenPurchaseUseCases {
    pub fn new(
        provider: Arc<dyn PaymentProviderPort>,
        payments: Arc<dyn PaymentRepo>,
        token_coefficient: f64,
    ) -> Self {
        Self {
            provider,
            payments,
            token_coefficient,
        }
    }

    pub async fn create_purchase(
        &self,
        user_id: &str,
        website_id: &str,
        tokens_amount: i64,
        currency: Option<&str>,
    ) -> AppResult<TokenPurchaseSession> {
        let currency = currency
            .map(str::to_lowercase)
            .unwrap_or_else(|| DEFAULT_PURCHASE_CURRENCY.to_string());
        if tokens_amount <= 0 {
            return Err(AppError::InvalidInput(
                "Token amount must be positive".to_string(),
            ));
        }

        let amount_cents = tokens_to_cents(tokens_amount, self.token_coefficient);
        if amount_cents <= MIN_CHARGE_CENTS {
            return Err(AppError::InvalidInput(format!(
                "Charge of {} cents is below the {} cent minimum",
                amount_cents, MIN_CHARGE_CENTS
            )));
        }

        let metadata = HashMap::from([
            (META_USER_ID.to_string(), user_id.to_string()),
            (META_WEBSITE_ID.to_string(), website_id.to_string()),
            (META_TOKENS_AMOUNT.to_string(), tokens_amount.to_string()),
        ]);
        let intent = self
            .provider
            .create_payment_intent(amount_cents, &currency, &metadata)
            .await?;

        let record = self
            .payments
            .create(&CreatePaymentInput {
                user_id: user_id.to_string(),
                website_id: website_id.to_string(),
                kind: PaymentKind::TokenPurchase,
                amount_cents,
                currency: currency.clone(),
                description: Some(format!("Purchase of {} tokens", tokens_amount)),
                status: PaymentStatus::Pending,
                stripe_payment_intent_id: Some(intent.id.clone()),
                stripe_subscription_id: None,
            })
            .await?;

        info!(
            user_id,
            website_id,
            tokens_amount,
            amount_cents,
            payment_intent_id = %intent.id,
            payment_id = %record.id,
            "Token purchase started"
        );

        Ok(TokenPurchaseSession {
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            payment_id: record.id,
            amount_cents,
        })
    }
}

fn tokens_to_cents(tokens: i64, coefficient: f64) -> i64 {
    (tokens as f64 / coefficient * 100.0).round() as i64
}
