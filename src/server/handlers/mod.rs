//! Route handler modules for the trust-o-meter REST API.

pub mod contacts;
pub mod health;
pub mod profiles;
pub mod statuses;
pub mod websocket;
