use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;

use crate::{
    adapters::http::app_state::AppState, app_error::AppResult,
    infra::stripe_client::StripeClient,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePayload {
    user_id: String,
    website_id: String,
    tokens_amount: i64,
    currency: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_purchase))
        .route("/webhook", post(webhook))
}

async fn create_purchase(
    State(app_state): State<AppState>,
    Json(payload): Json<CreatePayload>,
) -> AppResult<impl IntoResponse> {
    let session = app_state
        .token_purchase_use_cases
        .create_purchase(
            &payload.user_id,
            &payload.website_id,
            payload.tokens_amount,
            payload.currency.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// Same contract as the subscription webhook, but signed with the purchase
/// endpoint's own secret.
async fn webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    StripeClient::verify_webhook_signature(
        &body,
        signature,
        app_state
            .config
            .stripe_purchase_webhook_secret
            .expose_secret(),
    )?;

    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(event) => app_state.webhook_use_cases.process_event(&event).await,
        Err(e) => {
            tracing::error!(error = %e, "Webhook payload is not valid JSON; acknowledging anyway");
        }
    }

    Ok(Json(json!({ "received": true })))
}
