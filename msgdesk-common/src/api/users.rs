//! User repository and bearer token store
//!
//! Both live in memory and are lost on restart. The repository is a trait so
//! a durable backend can be injected without touching the HTTP layer.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use super::auth::{generate_token, hash_password, verify_password, AuthError};
use crate::time;

/// Storage for registered operators
pub trait UserRepository: Send + Sync {
    /// Register a new user; fails if the name is taken
    fn register(&self, username: &str, password: &str) -> Result<(), AuthError>;

    /// Check a username/password pair
    fn verify(&self, username: &str, password: &str) -> Result<(), AuthError>;
}

/// Non-durable [`UserRepository`] backed by a hash map
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, String>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRepository for InMemoryUserRepository {
    fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }

        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        if users.contains_key(username) {
            return Err(AuthError::UserExists(username.to_string()));
        }
        users.insert(username.to_string(), hash_password(password));
        Ok(())
    }

    fn verify(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        match users.get(username) {
            Some(stored) if verify_password(password, stored) => Ok(()),
            _ => Err(AuthError::InvalidCredentials),
        }
    }
}

#[derive(Debug, Clone)]
struct IssuedToken {
    username: String,
    issued_at: DateTime<Utc>,
}

/// Issues opaque bearer tokens and resolves them back to usernames
#[derive(Debug)]
pub struct TokenStore {
    tokens: RwLock<HashMap<String, IssuedToken>>,
    ttl: Duration,
}

impl TokenStore {
    /// Create a store whose tokens expire `ttl_secs` after issue
    pub fn new(ttl_secs: u64) -> Self {
        // chrono caps durations at i64::MAX milliseconds
        let ttl_secs = i64::try_from(ttl_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1_000);
        Self {
            tokens: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Issue a new token for `username`
    ///
    /// Expired tokens are swept on every issue.
    pub fn issue(&self, username: &str) -> String {
        let token = generate_token();
        let now = time::now();
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        tokens.retain(|_, issued| now - issued.issued_at <= self.ttl);
        tokens.insert(
            token.clone(),
            IssuedToken {
                username: username.to_string(),
                issued_at: now,
            },
        );
        token
    }

    /// Resolve a token to the username it was issued for
    ///
    /// Expired tokens are evicted on lookup.
    pub fn validate(&self, token: &str) -> Result<String, AuthError> {
        let issued = {
            let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
            tokens.get(token).cloned().ok_or(AuthError::InvalidToken)?
        };

        if time::now() - issued.issued_at > self.ttl {
            let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
            tokens.remove(token);
            return Err(AuthError::ExpiredToken);
        }

        Ok(issued.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_then_verify() {
        let repo = InMemoryUserRepository::new();
        repo.register("ana", "pw").unwrap();

        assert!(repo.verify("ana", "pw").is_ok());
        assert_eq!(repo.verify("ana", "nope"), Err(AuthError::InvalidCredentials));
        assert_eq!(repo.verify("bob", "pw"), Err(AuthError::InvalidCredentials));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let repo = InMemoryUserRepository::new();
        repo.register("ana", "pw").unwrap();

        assert_eq!(
            repo.register("ana", "other"),
            Err(AuthError::UserExists("ana".to_string()))
        );
    }

    #[test]
    fn test_empty_fields_rejected() {
        let repo = InMemoryUserRepository::new();
        assert_eq!(repo.register("", "pw"), Err(AuthError::MissingFields));
        assert_eq!(repo.register("ana", ""), Err(AuthError::MissingFields));
    }

    #[test]
    fn test_token_round_trip() {
        let store = TokenStore::new(3600);
        let token = store.issue("ana");

        assert_eq!(store.validate(&token), Ok("ana".to_string()));
        assert_eq!(store.validate("not-a-token"), Err(AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_expired_token_evicted() {
        let store = TokenStore::new(0);
        let token = store.issue("ana");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(store.validate(&token), Err(AuthError::ExpiredToken));
        // Second lookup no longer finds it at all
        assert_eq!(store.validate(&token), Err(AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_issue_sweeps_expired_tokens() {
        let store = TokenStore::new(0);
        let stale: Vec<String> = (0..3).map(|_| store.issue("ana")).collect();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let fresh = store.issue("bob");
        let tokens = store.tokens.read().unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens.contains_key(&fresh));
        assert!(stale.iter().all(|t| !tokens.contains_key(t)));
    }

    #[test]
    fn test_issue_keeps_live_tokens() {
        let store = TokenStore::new(3600);
        let first = store.issue("ana");
        let second = store.issue("bob");

        assert_eq!(store.validate(&first), Ok("ana".to_string()));
        assert_eq!(store.validate(&second), Ok("bob".to_string()));
    }
}
