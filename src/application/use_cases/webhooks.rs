//! Webhook reconciliation: correlates raw Stripe events with local payment
//! records and advances them through the status state machine.
//!
//! The webhook boundary acknowledges every verified event with 200 so Stripe
//! does not retry-storm on errors it cannot fix; everything that goes wrong
//! in here is logged, never surfaced as an HTTP failure.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::ports::{
        main_service::MainServicePort,
        payment_provider::PaymentProviderPort,
    },
    application::use_cases::payments::{CreatePaymentInput, PaymentRepo},
    domain::entities::payment::{CheckoutFlow, PaymentKind, PaymentStatus},
};

/// Metadata keys this service writes onto Stripe objects at creation time
/// and reads back off webhook events.
pub(crate) const META_APP_USER_ID: &str = "appUserId";
pub(crate) const META_USER_ID: &str = "userId";
pub(crate) const META_WEBSITE_ID: &str = "websiteId";
pub(crate) const META_PLAN_ID: &str = "planId";
pub(crate) const META_FLOW: &str = "type";
pub(crate) const META_TOKENS_AMOUNT: &str = "tokensAmount";

/// Business identifiers recovered from one provider event. Every field is
/// optional; an empty context routes the event to a no-op.
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    pub user_id: Option<String>,
    pub website_id: Option<String>,
    pub plan_id: Option<String>,
    pub subscription_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub flow: Option<CheckoutFlow>,
    pub tokens_amount: Option<i64>,
}

pub struct WebhookUseCases {
    provider: Arc<dyn PaymentProviderPort>,
    main_service: Arc<dyn MainServicePort>,
    payments: Arc<dyn PaymentRepo>,
}

impl WebhookUseCases {
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

    /// Entry point for a signature-verified event. Never fails: internal
    /// errors are logged and swallowed so the webhook is still acknowledged.
    pub async fn process_event(&self, event: &Value) {
        let event_type = event["type"].as_str().unwrap_or("");
        let event_id = event["id"].as_str().unwrap_or("");
        let object = &event["data"]["object"];

        let context = self.correlate(event_type, object).await;
        debug!(event_type, event_id, context = ?context, "Correlated webhook event");

        if let Err(e) = self.reconcile(event_type, &context, object).await {
            error!(
                error = %e,
                event_type,
                event_id,
                "Webhook reconciliation failed; event acknowledged anyway"
            );
        }
    }

    // ========================================================================
    // Event Correlator
    // ========================================================================

    /// Extracts business identifiers from the event payload, falling back to
    /// a secondary subscription fetch for invoice events (Stripe does not
    /// duplicate subscription metadata onto invoices). The fetch is the only
    /// side effect and is read-only; its failure degrades to a partial
    /// context instead of aborting the handler.
    async fn correlate(&self, event_type: &str, object: &Value) -> EventContext {
        let mut ctx = EventContext::default();

        if event_type.starts_with("customer.subscription.") {
            ctx.subscription_id = json_string(object, "id");
            let meta = &object["metadata"];
            ctx.user_id = json_string(meta, META_APP_USER_ID);
            ctx.website_id = json_string(meta, META_WEBSITE_ID);
            ctx.plan_id = json_string(meta, META_PLAN_ID);
            ctx.flow = meta[META_FLOW]
                .as_str()
                .and_then(CheckoutFlow::from_metadata_value);
        } else if event_type.starts_with("invoice.") {
            ctx.subscription_id = json_string(object, "subscription");
            if let Some(subscription_id) = ctx.subscription_id.clone() {
                match self.provider.get_subscription(&subscription_id).await {
                    Ok(subscription) => {
                        ctx.user_id = subscription.metadata.get(META_APP_USER_ID).cloned();
                        ctx.website_id = subscription.metadata.get(META_WEBSITE_ID).cloned();
                        ctx.plan_id = subscription.metadata.get(META_PLAN_ID).cloned();
                        ctx.flow = subscription
                            .metadata
                            .get(META_FLOW)
                            .and_then(|s| CheckoutFlow::from_metadata_value(s));
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            subscription_id,
                            "Could not fetch subscription for invoice event; continuing with partial context"
                        );
                    }
                }
            }
        } else if event_type.starts_with("payment_intent.") {
            ctx.payment_intent_id = json_string(object, "id");
            let meta = &object["metadata"];
            ctx.user_id =
                json_string(meta, META_USER_ID).or_else(|| json_string(meta, META_APP_USER_ID));
            ctx.website_id = json_string(meta, META_WEBSITE_ID);
            ctx.tokens_amount = meta[META_TOKENS_AMOUNT]
                .as_str()
                .and_then(|s| s.parse::<i64>().ok());
        }

        ctx
    }

    // ========================================================================
    // Payment State Reconciler
    // ========================================================================

    async fn reconcile(
        &self,
        event_type: &str,
        context: &EventContext,
        object: &Value,
    ) -> AppResult<()> {
        match event_type {
            "customer.subscription.created" => self.subscription_created(context, object).await,
            "customer.subscription.updated" => {
                // Deliberate no-op: the paid state is confirmed by
                // invoice.payment_succeeded, not by subscription updates.
                debug!(
                    subscription_id = ?context.subscription_id,
                    "Ignoring customer.subscription.updated"
                );
                Ok(())
            }
            "customer.subscription.deleted" => self.subscription_deleted(context).await,
            "invoice.payment_succeeded" => self.invoice_payment_succeeded(context, object).await,
            "invoice.payment_failed" => self.invoice_payment_failed(context).await,
            "payment_intent.succeeded" => self.payment_intent_succeeded(context).await,
            "payment_intent.payment_failed" => self.payment_intent_failed(context).await,
            _ => {
                debug!(event_type, "Unhandled webhook event type");
                Ok(())
            }
        }
    }

    async fn subscription_created(&self, context: &EventContext, object: &Value) -> AppResult<()> {
        let (Some(user_id), Some(subscription_id)) = (
            context.user_id.as_deref(),
            context.subscription_id.as_deref(),
        ) else {
            warn!("Skipping customer.subscription.created: missing user id or subscription id");
            return Ok(());
        };

        if let Some(record) = self.payments.find_by_subscription_id(subscription_id).await? {
            self.payments
                .update_status(record.id, PaymentStatus::Pending)
                .await?;
            info!(subscription_id, payment_id = %record.id, "Subscription record confirmed pending");
        } else {
            // First sight of this subscription; amount 0 until the first
            // invoice reports what was actually charged.
            let record = self
                .payments
                .create(&CreatePaymentInput {
                    user_id: user_id.to_string(),
                    website_id: context
                        .website_id
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string()),
                    kind: PaymentKind::Subscription,
                    amount_cents: 0,
                    currency: json_string(object, "currency").unwrap_or_else(|| "usd".to_string()),
                    description: Some(format!(
                        "Subscription created for plan {}",
                        context.plan_id.as_deref().unwrap_or("unknown")
                    )),
                    status: PaymentStatus::Pending,
                    stripe_payment_intent_id: None,
                    stripe_subscription_id: Some(subscription_id.to_string()),
                })
                .await?;
            warn!(
                subscription_id,
                payment_id = %record.id,
                "No record for new subscription; backfilled a pending one"
            );
        }

        Ok(())
    }

    async fn subscription_deleted(&self, context: &EventContext) -> AppResult<()> {
        let (Some(_user_id), Some(subscription_id)) = (
            context.user_id.as_deref(),
            context.subscription_id.as_deref(),
        ) else {
            warn!("Skipping customer.subscription.deleted: missing user id or subscription id");
            return Ok(());
        };

        match self.payments.find_by_subscription_id(subscription_id).await? {
            Some(record) => {
                self.payments
                    .update_status(record.id, PaymentStatus::Canceled)
                    .await?;
                info!(subscription_id, payment_id = %record.id, "Subscription record canceled");
            }
            None => {
                warn!(subscription_id, "No record for deleted subscription; nothing to cancel");
            }
        }

        Ok(())
    }

    async fn invoice_payment_succeeded(
        &self,
        context: &EventContext,
        object: &Value,
    ) -> AppResult<()> {
        let (Some(user_id), Some(subscription_id), Some(website_id)) = (
            context.user_id.as_deref(),
            context.subscription_id.as_deref(),
            context.website_id.as_deref(),
        ) else {
            warn!(
                subscription_id = ?context.subscription_id,
                "Skipping invoice.payment_succeeded: missing subscription id, user id or website id"
            );
            return Ok(());
        };

        let payment_id = match self.payments.find_by_subscription_id(subscription_id).await? {
            Some(record) => {
                self.payments
                    .update_status(record.id, PaymentStatus::Succeeded)
                    .await?;
                info!(subscription_id, payment_id = %record.id, "Subscription payment succeeded");
                record.id
            }
            None => {
                // Defensive backfill: record the payment we never saw created.
                let record = self
                    .payments
                    .create(&CreatePaymentInput {
                        user_id: user_id.to_string(),
                        website_id: website_id.to_string(),
                        kind: PaymentKind::Subscription,
                        amount_cents: object["amount_paid"].as_i64().unwrap_or(0),
                        currency: json_string(object, "currency")
                            .unwrap_or_else(|| "usd".to_string()),
                        description: Some(format!(
                            "Subscription payment for invoice {}",
                            object["id"].as_str().unwrap_or("unknown")
                        )),
                        status: PaymentStatus::Succeeded,
                        stripe_payment_intent_id: None,
                        stripe_subscription_id: Some(subscription_id.to_string()),
                    })
                    .await?;
                warn!(
                    subscription_id,
                    payment_id = %record.id,
                    "No record for paid subscription; backfilled a succeeded one"
                );
                record.id
            }
        };

        self.confirm_plan_change_if_applicable(context, subscription_id, payment_id)
            .await;

        Ok(())
    }

    /// Fire-and-forget confirmation toward the main service. The local
    /// record stays `Succeeded` whether or not this call lands; failures are
    /// logged for manual follow-up, not retried.
    async fn confirm_plan_change_if_applicable(
        &self,
        context: &EventContext,
        subscription_id: &str,
        payment_id: Uuid,
    ) {
        let applicable = matches!(
            context.flow,
            Some(CheckoutFlow::InitialSubscription) | Some(CheckoutFlow::PlanChange)
        );
        if !applicable {
            debug!(
                subscription_id,
                flow = ?context.flow,
                "Not a plan-affecting flow; skipping plan-change confirmation"
            );
            return;
        }

        let (Some(website_id), Some(plan_id)) =
            (context.website_id.as_deref(), context.plan_id.as_deref())
        else {
            warn!(
                subscription_id,
                "Missing website id or plan id; skipping plan-change confirmation"
            );
            return;
        };

        match self
            .main_service
            .confirm_plan_change(website_id, plan_id, subscription_id, payment_id)
            .await
        {
            Ok(()) => {
                info!(website_id, plan_id, subscription_id, "Plan change confirmed with main service");
            }
            Err(e) => {
                error!(
                    error = %e,
                    website_id,
                    plan_id,
                    subscription_id,
                    payment_id = %payment_id,
                    "Failed to confirm plan change with main service"
                );
            }
        }
    }

    async fn invoice_payment_failed(&self, context: &EventContext) -> AppResult<()> {
        let (Some(_user_id), Some(subscription_id)) = (
            context.user_id.as_deref(),
            context.subscription_id.as_deref(),
        ) else {
            warn!("Skipping invoice.payment_failed: missing user id or subscription id");
            return Ok(());
        };

        match self.payments.find_by_subscription_id(subscription_id).await? {
            Some(record) => {
                self.payments
                    .update_status(record.id, PaymentStatus::Failed)
                    .await?;
                info!(subscription_id, payment_id = %record.id, "Subscription payment failed");
            }
            None => {
                warn!(subscription_id, "No record for failed subscription invoice");
            }
        }

        Ok(())
    }

    async fn payment_intent_succeeded(&self, context: &EventContext) -> AppResult<()> {
        let Some(payment_intent_id) = context.payment_intent_id.as_deref() else {
            warn!("Skipping payment_intent.succeeded: missing payment intent id");
            return Ok(());
        };

        let Some(record) = self
            .payments
            .find_by_payment_intent_id(payment_intent_id)
            .await?
        else {
            warn!(payment_intent_id, "No record for succeeded payment intent");
            return Ok(());
        };

        self.payments
            .update_status(record.id, PaymentStatus::Succeeded)
            .await?;
        info!(payment_intent_id, payment_id = %record.id, "Token purchase succeeded");

        let tokens_amount = context.tokens_amount.unwrap_or(0);
        let Some(website_id) = context.website_id.as_deref() else {
            warn!(payment_intent_id, "No website id on payment intent; skipping credit add");
            return Ok(());
        };
        if tokens_amount <= 0 {
            warn!(payment_intent_id, "No positive token amount on payment intent; skipping credit add");
            return Ok(());
        }

        // Same fire-and-forget contract as the plan-change confirmation.
        if let Err(e) = self
            .main_service
            .add_credits(website_id, tokens_amount, record.id)
            .await
        {
            error!(
                error = %e,
                website_id,
                tokens_amount,
                payment_id = %record.id,
                "Failed to add credits in main service"
            );
        } else {
            info!(website_id, tokens_amount, payment_id = %record.id, "Credits added in main service");
        }

        Ok(())
    }

    async fn payment_intent_failed(&self, context: &EventContext) -> AppResult<()> {
        let Some(payment_intent_id) = context.payment_intent_id.as_deref() else {
            warn!("Skipping payment_intent.payment_failed: missing payment intent id");
            return Ok(());
        };

        match self
            .payments
            .find_by_payment_intent_id(payment_intent_id)
            .await?
        {
            Some(record) => {
                self.payments
                    .update_status(record.id, PaymentStatus::Failed)
                    .await?;
                info!(payment_intent_id, payment_id = %record.id, "Token purchase failed");
            }
            None => {
                warn!(payment_intent_id, "No record for failed payment intent");
            }
        }

        Ok(())
    }
}

fn json_string(value: &Value, key: &str) -> Option<String> {
    value[key].as_str().map(str::to_string)
}
