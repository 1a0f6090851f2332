//! # msgdesk Common Library
//!
//! Shared code for the msgdesk services:
//! - Error type
//! - Bootstrap configuration resolution and logging setup
//! - Credential primitives, user repository and bearer token store
//! - Time helpers

pub mod api;
pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
