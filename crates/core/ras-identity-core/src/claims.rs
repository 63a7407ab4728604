//! Handshake and session claims, and the service that signs and reads them.

use crate::user::User;
use async_trait::async_trait;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("Token not found")]
    Missing,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

pub type ClaimsResult<T> = Result<T, ClaimsError>;

/// CSRF binding issued at login and checked at callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub state: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from: String,
}

/// Claims carried by both handshake tokens (with `handshake`) and session tokens
/// (with `user`). Timestamps are unix seconds; zero means "let the service decide".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "jti")]
    pub id: String,
    #[serde(rename = "aud", default, skip_serializing_if = "String::is_empty")]
    pub audience: String,
    #[serde(rename = "iss", default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    #[serde(rename = "iat", default)]
    pub issued_at: i64,
    #[serde(rename = "exp", default)]
    pub expires_at: i64,
    #[serde(rename = "nbf", default)]
    pub not_before: i64,
    #[serde(rename = "sess_only", default, skip_serializing_if = "std::ops::Not::not")]
    pub session_only: bool,
    #[serde(rename = "no-ava", default, skip_serializing_if = "std::ops::Not::not")]
    pub no_avatar: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handshake: Option<Handshake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// Signs, stores and reads claims on behalf of the login flow.
///
/// `issue` and `clear` write into the outgoing response headers (cookies or
/// tokens), `read` looks at the incoming request headers.
#[async_trait]
pub trait ClaimsService: Send + Sync {
    /// Signs the claims, attaches them to the response and returns the token.
    async fn issue(&self, response: &mut HeaderMap, claims: Claims) -> ClaimsResult<String>;

    /// Reads and verifies the claims attached to a request.
    async fn read(&self, request: &HeaderMap) -> ClaimsResult<(Claims, String)>;

    /// Removes any claims from the client.
    async fn clear(&self, response: &mut HeaderMap);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_serialize_with_registered_names() {
        let claims = Claims {
            id: "cid".to_string(),
            audience: "site1".to_string(),
            expires_at: 100,
            handshake: Some(Handshake {
                state: "abc".to_string(),
                from: "/dashboard".to_string(),
            }),
            ..Claims::default()
        };

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["jti"], "cid");
        assert_eq!(json["aud"], "site1");
        assert_eq!(json["exp"], 100);
        assert_eq!(json["handshake"]["state"], "abc");
        assert!(json.get("user").is_none());
        assert!(json.get("sess_only").is_none());

        let back: Claims = serde_json::from_value(json).unwrap();
        assert_eq!(back, claims);
    }
}
