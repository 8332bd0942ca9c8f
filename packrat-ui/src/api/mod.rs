//! HTTP API handlers for packrat-ui

pub mod auth;
pub mod cards;
pub mod health;
pub mod import;
pub mod search;

pub use auth::CurrentUser;
