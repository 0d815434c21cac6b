pub mod payments;
pub mod subscriptions;
pub mod token_purchases;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/subscriptions", subscriptions::router())
        .nest("/token-purchases", token_purchases::router())
        .nest("/payments", payments::router())
}
