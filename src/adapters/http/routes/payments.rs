//! Read-side payment queries for the main service. Both routes require the
//! shared service key.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, middleware::verify_service_key},
    app_error::AppResult,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{payment_id}/status", get(payment_status))
        .route("/users/{user_id}", get(list_user_payments))
}

async fn payment_status(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(payment_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    verify_service_key(&headers, &app_state)?;
    let status = app_state.payment_use_cases.get_status(payment_id).await?;

    Ok(Json(json!({
        "paymentId": payment_id,
        "status": status,
    })))
}

async fn list_user_payments(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    verify_service_key(&headers, &app_state)?;
    let payments = app_state.payment_use_cases.list_for_user(&user_id).await?;

    // Bare array: the main service consumes the list directly.
    Ok(Json(payments))
}
