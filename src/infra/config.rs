use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

pub struct AppConfig {
    pub database_url: String,
    pub stripe_secret_key: SecretString,
    /// Signing secret of the subscription webhook endpoint.
    pub stripe_subscription_webhook_secret: SecretString,
    /// Signing secret of the token purchase webhook endpoint. Stripe issues
    /// one secret per endpoint, so the two are configured separately.
    pub stripe_purchase_webhook_secret: SecretString,
    pub main_service_base_url: Url,
    /// Shared key for service-to-service calls in both directions.
    pub payment_service_api_key: SecretString,
    /// Tokens per currency unit for one-time purchases.
    pub token_coefficient: f64,
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url: String = get_env("DATABASE_URL");

        let stripe_secret_key: SecretString =
            SecretString::new(get_env::<String>("STRIPE_SECRET_KEY").into());
        let stripe_subscription_webhook_secret: SecretString = SecretString::new(
            get_env::<String>("STRIPE_SUBSCRIPTION_WEBHOOK_SECRET").into(),
        );
        let stripe_purchase_webhook_secret: SecretString =
            SecretString::new(get_env::<String>("STRIPE_PURCHASE_WEBHOOK_SECRET").into());

        let main_service_base_url: Url = get_env("MAIN_SERVICE_API_BASE_URL");
        let payment_service_api_key: SecretString =
            SecretString::new(get_env::<String>("PAYMENT_SERVICE_API_KEY").into());

        let token_coefficient: f64 = get_env_default("TOKEN_COEFFICIENT_MULTIPLIER", 20.0);

        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");

        Self {
            database_url,
            stripe_secret_key,
            stripe_subscription_webhook_secret,
            stripe_purchase_webhook_secret,
            main_service_base_url,
            payment_service_api_key,
            token_coefficient,
            bind_addr,
            cors_origin,
        }
    }
}
