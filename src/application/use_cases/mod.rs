pub mod payments;
pub mod subscriptions;
pub mod token_purchases;
pub mod webhooks;
