pub mod acquire;
pub mod api;
pub mod client;
pub mod error;
pub mod models;
pub mod stats;
pub mod validate;
