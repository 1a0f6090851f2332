//! Shared API request/response types for the auth endpoints

use serde::{Deserialize, Serialize};

/// Body of `POST /api/auth/register` and `POST /api/auth/login`
///
/// Both fields are optional at the wire level so a missing field surfaces
/// as a 400 with a useful message instead of a deserialisation failure.
///
/// # Examples
///
/// ```
/// use msgdesk_common::api::types::Credentials;
///
/// let creds: Credentials = serde_json::from_str(r#"{"username": "ana"}"#).unwrap();
/// assert_eq!(creds.username.as_deref(), Some("ana"));
/// assert!(creds.password.is_none());
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    /// Both fields, if present and non-empty
    pub fn complete(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

/// Successful login response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_requires_both_fields() {
        let full = Credentials {
            username: Some("ana".into()),
            password: Some("pw".into()),
        };
        assert_eq!(full.complete(), Some(("ana", "pw")));

        let blank = Credentials {
            username: Some("ana".into()),
            password: Some(String::new()),
        };
        assert_eq!(blank.complete(), None);
        assert_eq!(Credentials::default().complete(), None);
    }

    #[test]
    fn test_token_response_serialization() {
        let json = serde_json::to_string(&TokenResponse::bearer("abc".into())).unwrap();
        assert!(json.contains("\"access_token\":\"abc\""));
        assert!(json.contains("\"token_type\":\"Bearer\""));
    }
}
