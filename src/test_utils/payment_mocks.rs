//! In-memory implementations of the payment repo and the two outbound ports.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::{
        main_service::{MainServicePort, MainServiceUser, PlanDetails},
        payment_provider::{
            PaymentProviderPort, ProviderCustomer, ProviderPaymentIntent, ProviderSubscription,
        },
    },
    application::use_cases::payments::{CreatePaymentInput, PaymentRepo},
    domain::entities::payment::{PaymentRecord, PaymentStatus},
};

// ============================================================================
// InMemoryPaymentRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryPaymentRepo {
    records: Mutex<Vec<PaymentRecord>>,
}

impl InMemoryPaymentRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record directly, bypassing find-or-create semantics.
    pub async fn insert(&self, record: PaymentRecord) -> PaymentRecord {
        self.seed(record)
    }

    /// Sync variant of `insert` for builder contexts.
    pub fn seed(&self, record: PaymentRecord) -> PaymentRecord {
        self.records
            .lock()
            .expect("payment repo lock poisoned")
            .push(record.clone());
        record
    }

    pub async fn all(&self) -> Vec<PaymentRecord> {
        self.records
            .lock()
            .expect("payment repo lock poisoned")
            .clone()
    }
}

#[async_trait]
impl PaymentRepo for InMemoryPaymentRepo {
    async fn create(&self, input: &CreatePaymentInput) -> AppResult<PaymentRecord> {
        let mut records = self.records.lock().expect("payment repo lock poisoned");

        // Same find-or-create-by-subscription contract as the Postgres repo.
        if let Some(subscription_id) = &input.stripe_subscription_id
            && let Some(existing) = records
                .iter()
                .find(|r| r.stripe_subscription_id.as_ref() == Some(subscription_id))
        {
            return Ok(existing.clone());
        }

        let now = chrono::Utc::now().naive_utc();
        let record = PaymentRecord {
            id: Uuid::new_v4(),
            user_id: input.user_id.clone(),
            website_id: input.website_id.clone(),
            kind: input.kind,
            amount_cents: input.amount_cents,
            currency: input.currency.clone(),
            description: input.description.clone(),
            status: input.status,
            stripe_payment_intent_id: input.stripe_payment_intent_id.clone(),
            stripe_subscription_id: input.stripe_subscription_id.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<PaymentRecord>> {
        let records = self.records.lock().expect("payment repo lock poisoned");
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> AppResult<Option<PaymentRecord>> {
        let records = self.records.lock().expect("payment repo lock poisoned");
        Ok(records
            .iter()
            .find(|r| r.stripe_subscription_id.as_deref() == Some(stripe_subscription_id))
            .cloned())
    }

    async fn find_by_payment_intent_id(
        &self,
        stripe_payment_intent_id: &str,
    ) -> AppResult<Option<PaymentRecord>> {
        let records = self.records.lock().expect("payment repo lock poisoned");
        Ok(records
            .iter()
            .find(|r| r.stripe_payment_intent_id.as_deref() == Some(stripe_payment_intent_id))
            .cloned())
    }

    async fn update_status(&self, id: Uuid, status: PaymentStatus) -> AppResult<()> {
        let mut records = self.records.lock().expect("payment repo lock poisoned");
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) if record.status.can_transition_to(status) => {
                record.status = status;
                record.updated_at = Some(chrono::Utc::now().naive_utc());
            }
            Some(record) => {
                tracing::debug!(
                    payment_id = %id,
                    current = %record.status,
                    requested = %status,
                    "Status update skipped - transition not allowed"
                );
            }
            None => {
                tracing::warn!(payment_id = %id, "Status update failed - record not found");
            }
        }
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<PaymentRecord>> {
        let records = self.records.lock().expect("payment repo lock poisoned");
        let mut matching: Vec<PaymentRecord> = records
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }
}

// ============================================================================
// MockPaymentProvider
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreatedPaymentIntent {
    pub id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Default)]
pub struct MockPaymentProvider {
    subscriptions: Mutex<HashMap<String, ProviderSubscription>>,
    created_customers: Mutex<Vec<ProviderCustomer>>,
    created_subscriptions: Mutex<Vec<ProviderSubscription>>,
    canceled_subscriptions: Mutex<Vec<String>>,
    created_payment_intents: Mutex<Vec<CreatedPaymentIntent>>,
    fail_subscription_fetch: Mutex<bool>,
    counter: Mutex<u64>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_subscription(&self, subscription: ProviderSubscription) {
        self.subscriptions
            .lock()
            .expect("provider lock poisoned")
            .insert(subscription.id.clone(), subscription);
    }

    /// Makes every `get_subscription` call fail with a provider error.
    pub fn fail_subscription_fetch(&self) {
        *self
            .fail_subscription_fetch
            .lock()
            .expect("provider lock poisoned") = true;
    }

    pub fn created_customers(&self) -> Vec<ProviderCustomer> {
        self.created_customers
            .lock()
            .expect("provider lock poisoned")
            .clone()
    }

    pub fn created_subscriptions(&self) -> Vec<ProviderSubscription> {
        self.created_subscriptions
            .lock()
            .expect("provider lock poisoned")
            .clone()
    }

    pub fn canceled_subscriptions(&self) -> Vec<String> {
        self.canceled_subscriptions
            .lock()
            .expect("provider lock poisoned")
            .clone()
    }

    pub fn created_payment_intents(&self) -> Vec<CreatedPaymentIntent> {
        self.created_payment_intents
            .lock()
            .expect("provider lock poisoned")
            .clone()
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut counter = self.counter.lock().expect("provider lock poisoned");
        *counter += 1;
        format!("{}_mock{}", prefix, counter)
    }
}

#[async_trait]
impl PaymentProviderPort for MockPaymentProvider {
    async fn create_customer(
        &self,
        email: &str,
        _app_user_id: &str,
    ) -> AppResult<ProviderCustomer> {
        let customer = ProviderCustomer {
            id: self.next_id("cus"),
            email: Some(email.to_string()),
        };
        self.created_customers
            .lock()
            .expect("provider lock poisoned")
            .push(customer.clone());
        Ok(customer)
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        _price_id: &str,
        metadata: &HashMap<String, String>,
    ) -> AppResult<ProviderSubscription> {
        let id = self.next_id("sub");
        let subscription = ProviderSubscription {
            id: id.clone(),
            customer_id: customer_id.to_string(),
            status: "incomplete".to_string(),
            currency: Some("usd".to_string()),
            client_secret: Some(format!("{}_secret", id)),
            metadata: metadata.clone(),
        };
        self.created_subscriptions
            .lock()
            .expect("provider lock poisoned")
            .push(subscription.clone());
        self.subscriptions
            .lock()
            .expect("provider lock poisoned")
            .insert(id, subscription.clone());
        Ok(subscription)
    }

    async fn get_subscription(&self, subscription_id: &str) -> AppResult<ProviderSubscription> {
        if *self
            .fail_subscription_fetch
            .lock()
            .expect("provider lock poisoned")
        {
            return Err(AppError::PaymentProvider("Simulated outage".to_string()));
        }

        self.subscriptions
            .lock()
            .expect("provider lock poisoned")
            .get(subscription_id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> AppResult<()> {
        let removed = self
            .subscriptions
            .lock()
            .expect("provider lock poisoned")
            .remove(subscription_id);
        match removed {
            Some(_) => {
                self.canceled_subscriptions
                    .lock()
                    .expect("provider lock poisoned")
                    .push(subscription_id.to_string());
                Ok(())
            }
            None => Err(AppError::NotFound),
        }
    }

    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> AppResult<ProviderPaymentIntent> {
        let id = self.next_id("pi");
        self.created_payment_intents
            .lock()
            .expect("provider lock poisoned")
            .push(CreatedPaymentIntent {
                id: id.clone(),
                amount_cents,
                currency: currency.to_string(),
                metadata: metadata.clone(),
            });
        Ok(ProviderPaymentIntent {
            client_secret: Some(format!("{}_secret", id)),
            id,
        })
    }
}

// ============================================================================
// MockMainService
// ============================================================================

#[derive(Debug, Clone)]
pub struct PlanChangeConfirmation {
    pub website_id: String,
    pub plan_id: String,
    pub stripe_subscription_id: String,
    pub payment_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct CreditAddition {
    pub website_id: String,
    pub tokens_to_add: i64,
    pub payment_id: Uuid,
}

#[derive(Default)]
pub struct MockMainService {
    users: Mutex<HashMap<String, MainServiceUser>>,
    plans: Mutex<HashMap<String, PlanDetails>>,
    plan_change_confirmations: Mutex<Vec<PlanChangeConfirmation>>,
    credit_additions: Mutex<Vec<CreditAddition>>,
    fail_confirmations: Mutex<bool>,
}

impl MockMainService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: MainServiceUser) {
        self.users
            .lock()
            .expect("main service lock poisoned")
            .insert(user.id.clone(), user);
    }

    pub fn insert_plan(&self, plan: PlanDetails) {
        self.plans
            .lock()
            .expect("main service lock poisoned")
            .insert(plan.id.clone(), plan);
    }

    pub fn stripe_customer_id_for(&self, user_id: &str) -> Option<String> {
        self.users
            .lock()
            .expect("main service lock poisoned")
            .get(user_id)
            .and_then(|u| u.stripe_customer_id.clone())
    }

    /// Makes `confirm_plan_change` and `add_credits` fail with an upstream
    /// error.
    pub fn fail_confirmations(&self) {
        *self
            .fail_confirmations
            .lock()
            .expect("main service lock poisoned") = true;
    }

    pub fn plan_change_confirmations(&self) -> Vec<PlanChangeConfirmation> {
        self.plan_change_confirmations
            .lock()
            .expect("main service lock poisoned")
            .clone()
    }

    pub fn credit_additions(&self) -> Vec<CreditAddition> {
        self.credit_additions
            .lock()
            .expect("main service lock poisoned")
            .clone()
    }
}

#[async_trait]
impl MainServicePort for MockMainService {
    async fn get_user(&self, user_id: &str, _auth_token: &str) -> AppResult<MainServiceUser> {
        self.users
            .lock()
            .expect("main service lock poisoned")
            .get(user_id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn set_stripe_customer_id(
        &self,
        user_id: &str,
        stripe_customer_id: &str,
        _auth_token: &str,
    ) -> AppResult<()> {
        let mut users = self.users.lock().expect("main service lock poisoned");
        let user = users.get_mut(user_id).ok_or(AppError::NotFound)?;
        user.stripe_customer_id = Some(stripe_customer_id.to_string());
        Ok(())
    }

    async fn get_plan(&self, plan_id: &str) -> AppResult<PlanDetails> {
        self.plans
            .lock()
            .expect("main service lock poisoned")
            .get(plan_id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn confirm_plan_change(
        &self,
        website_id: &str,
        new_plan_id: &str,
        new_stripe_subscription_id: &str,
        payment_id: Uuid,
    ) -> AppResult<()> {
        if *self
            .fail_confirmations
            .lock()
            .expect("main service lock poisoned")
        {
            return Err(AppError::Upstream("Simulated outage".to_string()));
        }
        self.plan_change_confirmations
            .lock()
            .expect("main service lock poisoned")
            .push(PlanChangeConfirmation {
                website_id: website_id.to_string(),
                plan_id: new_plan_id.to_string(),
                stripe_subscription_id: new_stripe_subscription_id.to_string(),
                payment_id,
            });
        Ok(())
    }

    async fn add_credits(
        &self,
        website_id: &str,
        tokens_to_add: i64,
        payment_id: Uuid,
    ) -> AppResult<()> {
        if *self
            .fail_confirmations
            .lock()
            .expect("main service lock poisoned")
        {
            return Err(AppError::Upstream("Simulated outage".to_string()));
        }
        self.credit_additions
            .lock()
            .expect("main service lock poisoned")
            .push(CreditAddition {
                website_id: website_id.to_string(),
                tokens_to_add,
                payment_id,
            });
        Ok(())
    }
}
