use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::payment::{PaymentKind, PaymentRecord, PaymentStatus},
};

#[derive(Debug, Clone)]
pub struct CreatePaymentInput {
    pub user_id: String,
    pub website_id: String,
    pub kind: PaymentKind,
    pub amount_cents: i64,
    pub currency: String,
    pub description: Option<String>,
    pub status: PaymentStatus,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
}

/// Keyed store for payment records.
///
/// `create` has find-or-create semantics on the subscription reference: when
/// a record for the same `stripe_subscription_id` already exists, the
/// existing record is returned instead of inserting a duplicate. Concurrent
/// first-sight webhook deliveries therefore cannot create two records for
/// one subscription.
///
/// `update_status` only applies transitions permitted by
/// `PaymentStatus::can_transition_to`; forbidden transitions and unknown ids
/// are logged and ignored so webhook replays stay harmless.
#[async_trait]
pub trait PaymentRepo: Send + Sync {
    async fn create(&self, input: &CreatePaymentInput) -> AppResult<PaymentRecord>;

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentRecord>>;

    async fn find_by_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> AppResult<Option<PaymentRecord>>;

    async fn find_by_payment_intent_id(
        &self,
        stripe_payment_intent_id: &str,
    ) -> AppResult<Option<PaymentRecord>>;

    async fn update_status(&self, id: Uuid, status: PaymentStatus) -> AppResult<()>;

    /// Newest first.
    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<PaymentRecord>>;
}

/// Read-side queries used by the main service over the guarded payments API.
pub struct PaymentUseCases {
    payments: Arc<dyn PaymentRepo>,
}

impl PaymentUseCases {
    pub fn new(payments: Arc<dyn PaymentRepo>) -> Self {
        Self { payments }
    }

    pub async fn get_status(&self, payment_id: Uuid) -> AppResult<PaymentStatus> {
        let record = self
            .payments
            .get_by_id(payment_id)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(record.status)
    }

    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<PaymentRecord>> {
        self.payments.list_by_user(user_id).await
    }
}
