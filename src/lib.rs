pub mod auth;
pub mod error;
pub mod models;
pub mod server;
pub mod store;
