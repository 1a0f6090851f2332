//! Credential primitives: password hashing and opaque bearer tokens
//!
//! # Architecture
//!
//! - Passwords are stored as `pbkdf2-sha256$<rounds>$<salt hex>$<hash hex>`
//!   (PBKDF2-HMAC-SHA256 keyed on the salt string); the round count travels
//!   with the hash so it can be raised without invalidating old entries
//! - Bearer tokens are opaque random strings; their meaning (which user,
//!   when issued) lives only in the server-side [`TokenStore`]
//!
//! # Pure Functions
//!
//! Hashing and token generation have no HTTP framework dependencies (Axum,
//! etc.); the middleware that consumes them lives in the service crate.
//!
//! [`TokenStore`]: crate::api::users::TokenStore

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

const HASH_SCHEME: &str = "pbkdf2-sha256";
const HASH_ROUNDS: u32 = 100_000;
const HASH_LEN: usize = 32;
const SALT_LEN: usize = 16;

// ========================================
// Error Types
// ========================================

/// Authentication error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Username or password missing from the request
    #[error("Missing required fields")]
    MissingFields,

    /// Registration for a name that is already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Unknown user or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Bearer token missing from the request
    #[error("Missing bearer token")]
    MissingToken,

    /// Bearer token unknown to the token store
    #[error("Invalid bearer token")]
    InvalidToken,

    /// Bearer token older than the configured lifetime
    #[error("Bearer token expired")]
    ExpiredToken,
}

// ========================================
// Password Hashing
// ========================================

/// Hash a password with a fresh random salt
///
/// # Examples
///
/// ```
/// use msgdesk_common::api::auth::{hash_password, verify_password};
///
/// let stored = hash_password("hunter2");
/// assert!(stored.starts_with("pbkdf2-sha256$"));
/// assert!(verify_password("hunter2", &stored));
/// assert!(!verify_password("hunter3", &stored));
/// ```
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt_hex = to_hex(&salt);
    let derived = derive(&salt_hex, password, HASH_ROUNDS);
    format!("{}${}${}${}", HASH_SCHEME, HASH_ROUNDS, salt_hex, derived)
}

/// Check a password against a stored hash produced by [`hash_password`]
///
/// Malformed stored values never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(4, '$');
    let (Some(scheme), Some(rounds), Some(salt_hex), Some(expected)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let Some(rounds) = rounds.parse::<u32>().ok().filter(|r| *r > 0) else {
        return false;
    };

    let calculated = derive(salt_hex, password, rounds);
    constant_time_eq(calculated.as_bytes(), expected.as_bytes())
}

fn derive(salt_hex: &str, password: &str, rounds: u32) -> String {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt_hex.as_bytes(), rounds, &mut out);
    to_hex(&out)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ========================================
// Tokens
// ========================================

/// Generate a new opaque bearer token (64 hex chars)
pub fn generate_token() -> String {
    // Two v4 UUIDs give 244 random bits
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Extract the token from an `Authorization` header value
///
/// Accepts `Bearer <token>` with a case-insensitive scheme.
pub fn parse_bearer(header_value: &str) -> Result<&str, AuthError> {
    let (scheme, token) = header_value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MissingToken)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingToken);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

// ========================================
// Tests
// ========================================
