use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, post},
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;

use crate::{
    adapters::http::{
        app_state::AppState,
        middleware::{auth_token, verify_service_key},
    },
    app_error::AppResult,
    infra::stripe_client::StripeClient,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePayload {
    user_id: String,
    website_id: String,
    plan_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePlanPayload {
    user_id: String,
    website_id: String,
    new_plan_id: String,
    old_stripe_subscription_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelQuery {
    user_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_subscription))
        .route("/webhook", post(webhook))
        .route("/change-plan", post(change_plan))
        .route("/{stripe_subscription_id}", delete(cancel_subscription))
}

async fn create_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePayload>,
) -> AppResult<impl IntoResponse> {
    let token = auth_token(&headers)?;
    let session = app_state
        .subscription_use_cases
        .create_subscription(
            &payload.user_id,
            &payload.website_id,
            &payload.plan_id,
            &token,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

async fn change_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ChangePlanPayload>,
) -> AppResult<impl IntoResponse> {
    verify_service_key(&headers, &app_state)?;
    let token = auth_token(&headers)?;

    let session = app_state
        .subscription_use_cases
        .change_plan(
            &payload.user_id,
            &payload.website_id,
            &payload.new_plan_id,
            payload.old_stripe_subscription_id.as_deref(),
            &token,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Plan change initiated",
            "newSubscriptionId": session.subscription_id,
            "clientSecret": session.client_secret,
            "paymentId": session.payment_id,
        })),
    ))
}

async fn cancel_subscription(
    State(app_state): State<AppState>,
    Path(stripe_subscription_id): Path<String>,
    Query(query): Query<CancelQuery>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let token = auth_token(&headers)?;
    app_state
        .subscription_use_cases
        .cancel_subscription(&query.user_id, &stripe_subscription_id, &token)
        .await?;

    Ok(Json(json!({ "message": "Subscription canceled" })))
}

/// Signature failure is the only way out with a non-200; once the payload is
/// authenticated, every processing outcome acks the delivery so Stripe does
/// not retry events we cannot handle any better next time.
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
            .stripe_subscription_webhook_secret
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
