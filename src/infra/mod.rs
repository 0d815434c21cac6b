pub mod app;
pub mod config;
pub mod db;
pub mod http_client;
pub mod main_service_client;
pub mod setup;
pub mod stripe_client;
