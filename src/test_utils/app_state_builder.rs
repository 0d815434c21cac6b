//! Test app state builder for HTTP-level integration testing.
//!
//! Creates a minimal `AppState` wired to in-memory mocks so handlers can be
//! exercised with `axum_test::TestServer` without Postgres or Stripe.

use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    application::ports::{
        main_service::{MainServicePort, MainServiceUser, PlanDetails},
        payment_provider::{PaymentProviderPort, ProviderSubscription},
    },
    application::use_cases::{
        payments::{PaymentRepo, PaymentUseCases},
        subscriptions::SubscriptionUseCases,
        token_purchases::TokenPurchaseUseCases,
        webhooks::WebhookUseCases,
    },
    domain::entities::payment::PaymentRecord,
    infra::config::AppConfig,
    test_utils::{InMemoryPaymentRepo, MockMainService, MockPaymentProvider},
};

pub const TEST_SERVICE_KEY: &str = "test_service_key_12345678";
pub const TEST_SUBSCRIPTION_WEBHOOK_SECRET: &str = "whsec_test_subscriptions";
pub const TEST_PURCHASE_WEBHOOK_SECRET: &str = "whsec_test_purchases";

/// Builder for creating `AppState` backed by in-memory mocks.
///
/// # Example
///
/// ```ignore
/// let builder = TestAppStateBuilder::new()
///     .with_user(test_user("u1", |_| {}))
///     .with_plan(test_plan("p1", |_| {}));
/// let server = TestServer::new(create_app(builder.build())).unwrap();
/// ```
pub struct TestAppStateBuilder {
    provider: Arc<MockPaymentProvider>,
    main_service: Arc<MockMainService>,
    payments: Arc<InMemoryPaymentRepo>,
    token_coefficient: f64,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            provider: Arc::new(MockPaymentProvider::new()),
            main_service: Arc::new(MockMainService::new()),
            payments: Arc::new(InMemoryPaymentRepo::new()),
            token_coefficient: 20.0,
        }
    }

    pub fn with_user(self, user: MainServiceUser) -> Self {
        self.main_service.insert_user(user);
        self
    }

    pub fn with_plan(self, plan: PlanDetails) -> Self {
        self.main_service.insert_plan(plan);
        self
    }

    pub fn with_provider_subscription(self, subscription: ProviderSubscription) -> Self {
        self.provider.insert_subscription(subscription);
        self
    }

    pub fn with_payment(self, record: PaymentRecord) -> Self {
        self.payments.seed(record);
        self
    }

    pub fn with_token_coefficient(mut self, coefficient: f64) -> Self {
        self.token_coefficient = coefficient;
        self
    }

    /// Handles for asserting on mock interactions after requests.
    pub fn provider(&self) -> Arc<MockPaymentProvider> {
        self.provider.clone()
    }

    pub fn main_service(&self) -> Arc<MockMainService> {
        self.main_service.clone()
    }

    pub fn payments(&self) -> Arc<InMemoryPaymentRepo> {
        self.payments.clone()
    }

    pub fn build(self) -> AppState {
        let config = AppConfig {
            database_url: "postgres://unused".to_string(),
            stripe_secret_key: SecretString::new("sk_test_key".into()),
            stripe_subscription_webhook_secret: SecretString::new(
                TEST_SUBSCRIPTION_WEBHOOK_SECRET.into(),
            ),
            stripe_purchase_webhook_secret: SecretString::new(
                TEST_PURCHASE_WEBHOOK_SECRET.into(),
            ),
            main_service_base_url: Url::parse("http://localhost:4000").expect("valid test url"),
            payment_service_api_key: SecretString::new(TEST_SERVICE_KEY.into()),
            token_coefficient: self.token_coefficient,
            bind_addr: "127.0.0.1:0".parse().expect("valid test addr"),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
        };

        let provider = self.provider as Arc<dyn PaymentProviderPort>;
        let main_service = self.main_service as Arc<dyn MainServicePort>;
        let payments = self.payments as Arc<dyn PaymentRepo>;

        AppState {
            config: Arc::new(config),
            subscription_use_cases: Arc::new(SubscriptionUseCases::new(
                provider.clone(),
                main_service.clone(),
                payments.clone(),
            )),
            token_purchase_use_cases: Arc::new(TokenPurchaseUseCases::new(
                provider.clone(),
                payments.clone(),
                self.token_coefficient,
            )),
            webhook_use_cases: Arc::new(WebhookUseCases::new(
                provider,
                main_service,
                payments.clone(),
            )),
            payment_use_cases: Arc::new(PaymentUseCases::new(payments)),
        }
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
