//! API module for shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - In-memory user and token stores
//! - Shared types
//!
//! The service crate wraps these with Axum middleware and handlers.

pub mod auth;
pub mod types;
pub mod users;

pub use auth::{generate_token, hash_password, parse_bearer, verify_password, AuthError};
pub use types::{Credentials, TokenResponse};
pub use users::{InMemoryUserRepository, TokenStore, UserRepository};
