//! # Packrat Common Library
//!
//! Shared code for the packrat card-inventory service:
//! - Error types
//! - Configuration loading and root folder resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
