//! Request authentication helpers.
//!
//! Two auth schemes coexist:
//! - end-user routes forward the caller's `x-auth-token` to the main service,
//!   which is the actual authority on who the user is;
//! - service-to-service routes require the shared `x-main-service-api-key`.

use axum::http::HeaderMap;
use secrecy::ExposeSecret;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
};

pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";
pub const SERVICE_API_KEY_HEADER: &str = "x-main-service-api-key";

/// Extracts the forwarded end-user auth token.
pub fn auth_token(headers: &HeaderMap) -> AppResult<String> {
    let token = headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Missing auth token".to_string()))?;
    Ok(token.to_string())
}

/// Rejects the request unless the shared service key matches.
pub fn verify_service_key(headers: &HeaderMap, app_state: &AppState) -> AppResult<()> {
    let presented = headers
        .get(SERVICE_API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if presented.is_empty()
        || !constant_time_eq(
            presented.as_bytes(),
            app_state
                .config
                .payment_service_api_key
                .expose_secret()
                .as_bytes(),
        )
    {
        return Err(AppError::InvalidApiKey);
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
