pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod posts;
pub mod profiles;
pub mod state;
pub mod store;
pub mod validation;
