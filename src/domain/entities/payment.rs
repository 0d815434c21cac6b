use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a payment record is paying for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Subscription,
    TokenPurchase,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Subscription => "subscription",
            PaymentKind::TokenPurchase => "token_purchase",
        }
    }
}

impl std::fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a payment attempt.
///
/// Transitions are forward-only: a record never returns to `Pending` once it
/// has left it, and `Succeeded`/`Canceled` are terminal. `Failed` may still
/// advance to `Succeeded` (a later invoice for the same subscription can pay)
/// or to `Canceled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
        }
    }

    /// Whether a write from `self` to `next` is permitted.
    ///
    /// Writing the current status again is always allowed (idempotent no-op),
    /// which is what makes duplicate webhook deliveries harmless.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            PaymentStatus::Pending => true,
            PaymentStatus::Failed => {
                matches!(next, PaymentStatus::Succeeded | PaymentStatus::Canceled)
            }
            PaymentStatus::Succeeded | PaymentStatus::Canceled => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Succeeded | PaymentStatus::Canceled)
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "failed" => Ok(PaymentStatus::Failed),
            "canceled" => Ok(PaymentStatus::Canceled),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

/// Checkout flow marker written into Stripe subscription metadata at creation
/// time and echoed back on every related webhook event. Decides whether a
/// successful invoice triggers the plan-change confirmation callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutFlow {
    InitialSubscription,
    PlanChange,
}

impl CheckoutFlow {
    pub fn as_metadata_value(&self) -> &'static str {
        match self {
            CheckoutFlow::InitialSubscription => "initial_subscription",
            CheckoutFlow::PlanChange => "plan_change",
        }
    }

    /// Unknown tags parse to `None`; the reconciler treats them as "do not
    /// confirm anything downstream".
    pub fn from_metadata_value(s: &str) -> Option<Self> {
        match s {
            "initial_subscription" => Some(CheckoutFlow::InitialSubscription),
            "plan_change" => Some(CheckoutFlow::PlanChange),
            _ => None,
        }
    }
}

/// One tracked payment attempt.
///
/// Exactly one of `stripe_subscription_id` (recurring) and
/// `stripe_payment_intent_id` (one-time) is populated in normal operation.
/// User and website ids are opaque identifiers owned by the main service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Uuid,
    pub user_id: String,
    pub website_id: String,
    pub kind: PaymentKind,
    pub amount_cents: i64,
    pub currency: String,
    pub description: Option<String>,
    pub status: PaymentStatus,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}
