use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{http::app_state::AppState, persistence::PostgresPersistence},
    application::{
        ports::{main_service::MainServicePort, payment_provider::PaymentProviderPort},
        use_cases::{
            payments::{PaymentRepo, PaymentUseCases},
            subscriptions::SubscriptionUseCases,
            token_purchases::TokenPurchaseUseCases,
            webhooks::WebhookUseCases,
        },
    },
    infra::{
        config::AppConfig, db::init_db, main_service_client::MainServiceClient,
        stripe_client::StripeClient,
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let pool = init_db(&config.database_url).await?;
    let postgres_arc = Arc::new(PostgresPersistence::new(pool));
    let payments_arc = postgres_arc as Arc<dyn PaymentRepo>;

    let provider_arc = Arc::new(StripeClient::new(config.stripe_secret_key.clone()))
        as Arc<dyn PaymentProviderPort>;
    let main_service_arc = Arc::new(MainServiceClient::new(
        &config.main_service_base_url,
        config.payment_service_api_key.clone(),
    )) as Arc<dyn MainServicePort>;

    let subscription_use_cases = SubscriptionUseCases::new(
        provider_arc.clone(),
        main_service_arc.clone(),
        payments_arc.clone(),
    );
    let token_purchase_use_cases = TokenPurchaseUseCases::new(
        provider_arc.clone(),
        payments_arc.clone(),
        config.token_coefficient,
    );
    let webhook_use_cases = WebhookUseCases::new(
        provider_arc,
        main_service_arc,
        payments_arc.clone(),
    );
    let payment_use_cases = PaymentUseCases::new(payments_arc);

    Ok(AppState {
        config: Arc::new(config),
        subscription_use_cases: Arc::new(subscription_use_cases),
        token_purchase_use_cases: Arc::new(token_purchase_use_cases),
        webhook_use_cases: Arc::new(webhook_use_cases),
        payment_use_cases: Arc::new(payment_use_cases),
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "payments_api=debug,tower_http=debug".into());

    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init()
        .ok();
}
