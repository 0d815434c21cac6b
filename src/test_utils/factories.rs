//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible
//! defaults. Use the closure parameter to override specific fields as needed.

use chrono::NaiveDateTime;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    application::ports::{
        main_service::{MainServiceUser, PlanDetails},
        payment_provider::ProviderSubscription,
    },
    domain::entities::payment::{PaymentKind, PaymentRecord, PaymentStatus},
};

fn test_datetime() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Create a test payment record with sensible defaults.
pub fn create_test_payment(overrides: impl FnOnce(&mut PaymentRecord)) -> PaymentRecord {
    let now = test_datetime();
    let mut payment = PaymentRecord {
        id: Uuid::new_v4(),
        user_id: "u1".to_string(),
        website_id: "w1".to_string(),
        kind: PaymentKind::Subscription,
        amount_cents: 1999,
        currency: "usd".to_string(),
        description: Some("Test payment".to_string()),
        status: PaymentStatus::Pending,
        stripe_payment_intent_id: None,
        stripe_subscription_id: Some(format!("sub_test{}", Uuid::new_v4().simple())),
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut payment);
    payment
}

/// Create a main service user with sensible defaults (customer already set).
pub fn test_user(id: &str, overrides: impl FnOnce(&mut MainServiceUser)) -> MainServiceUser {
    let mut user = MainServiceUser {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        stripe_customer_id: Some(format!("cus_test{}", id)),
    };
    overrides(&mut user);
    user
}

/// Create a plan with sensible defaults.
pub fn test_plan(id: &str, overrides: impl FnOnce(&mut PlanDetails)) -> PlanDetails {
    let mut plan = PlanDetails {
        id: id.to_string(),
        name: "Basic Plan".to_string(),
        price_monthly: 19.99,
        stripe_price_id: Some(format!("price_test{}", id)),
    };
    overrides(&mut plan);
    plan
}

/// Create a provider-side subscription with sensible defaults.
pub fn test_subscription(
    id: &str,
    customer_id: &str,
    overrides: impl FnOnce(&mut ProviderSubscription),
) -> ProviderSubscription {
    let mut subscription = ProviderSubscription {
        id: id.to_string(),
        customer_id: customer_id.to_string(),
        status: "active".to_string(),
        currency: Some("usd".to_string()),
        client_secret: None,
        metadata: Default::default(),
    };
    overrides(&mut subscription);
    subscription
}

// ============================================================================
// Webhook event payloads
// ============================================================================

pub fn subscription_event(
    event_type: &str,
    subscription_id: &str,
    user_id: &str,
    website_id: &str,
    plan_id: &str,
    flow: &str,
) -> Value {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": event_type,
        "data": {
            "object": {
                "id": subscription_id,
                "object": "subscription",
                "currency": "usd",
                "metadata": {
                    "appUserId": user_id,
                    "websiteId": website_id,
                    "planId": plan_id,
                    "type": flow,
                }
            }
        }
    })
}

pub fn invoice_event(
    event_type: &str,
    invoice_id: &str,
    subscription_id: Option<&str>,
    amount_paid: i64,
) -> Value {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": event_type,
        "data": {
            "object": {
                "id": invoice_id,
                "object": "invoice",
                "subscription": subscription_id,
                "amount_paid": amount_paid,
                "currency": "usd",
            }
        }
    })
}

pub fn payment_intent_event(
    event_type: &str,
    payment_intent_id: &str,
    user_id: &str,
    website_id: &str,
    tokens_amount: i64,
) -> Value {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": event_type,
        "data": {
            "object": {
                "id": payment_intent_id,
                "object": "payment_intent",
                "metadata": {
                    "userId": user_id,
                    "websiteId": website_id,
                    "tokensAmount": tokens_amount.to_string(),
                }
            }
        }
    })
}

/// Builds a `Stripe-Signature` header value that verifies against `secret`
/// for the given payload.
pub fn stripe_signature_header(payload: &str, secret: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let timestamp = chrono::Utc::now().timestamp();
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    format!("t={},v1={}", timestamp, signature)
}
