pub mod auth;
pub mod catalog;
pub mod contact;
pub mod logging;
pub mod profile;
pub mod server;
pub mod storage;
pub mod trust;
