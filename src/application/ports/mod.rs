pub mod main_service;
pub mod payment_provider;
