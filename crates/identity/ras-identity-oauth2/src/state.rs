//! Handshake issuance and validation for CSRF protection.

use crate::client::rand_token;
use crate::config::FlowConfig;
use crate::error::{FlowError, FlowResult, OAuth2Result};
use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use ras_identity_core::{Claims, ClaimsService, Handshake};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Records handshakes that already passed validation.
#[async_trait]
pub trait HandshakeStore: Send + Sync {
    /// Marks a handshake claim id as used until `expires_at`.
    ///
    /// Returns `false` when the claim id was already recorded.
    async fn consume(&self, claim_id: &str, expires_at: DateTime<Utc>) -> OAuth2Result<bool>;

    /// Forgets records whose handshake has expired anyway.
    async fn cleanup_expired(&self) -> OAuth2Result<usize>;
}

/// In-memory implementation of HandshakeStore
pub struct InMemoryHandshakeStore {
    used: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl InMemoryHandshakeStore {
    pub fn new() -> Self {
        Self {
            used: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryHandshakeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HandshakeStore for InMemoryHandshakeStore {
    async fn consume(&self, claim_id: &str, expires_at: DateTime<Utc>) -> OAuth2Result<bool> {
        let mut used = self.used.write().await;
        let now = Utc::now();
        used.retain(|_, expiry| *expiry > now);

        if used.contains_key(claim_id) {
            return Ok(false);
        }
        used.insert(claim_id.to_string(), expires_at);
        Ok(true)
    }

    async fn cleanup_expired(&self) -> OAuth2Result<usize> {
        let mut used = self.used.write().await;
        let now = Utc::now();

        let before = used.len();
        used.retain(|_, expiry| *expiry > now);

        Ok(before - used.len())
    }
}

/// Login parameters bound into a handshake.
#[derive(Debug, Clone, Default)]
pub struct HandshakeRequest {
    pub from: String,
    pub audience: String,
    pub session_only: bool,
    pub no_avatar: bool,
}

#[derive(Debug, Clone)]
pub struct IssuedHandshake {
    /// Value to send to the provider as the `state` parameter.
    pub state: String,
    /// Signed handshake token as returned by the claims service.
    pub token: String,
    pub claims: Claims,
}

/// Creates handshakes at login and checks them at callback.
pub struct HandshakeManager {
    claims: Arc<dyn ClaimsService>,
    store: Arc<dyn HandshakeStore>,
    ttl: Duration,
    clock_skew: Duration,
    single_use: bool,
}

impl HandshakeManager {
    pub fn new(claims: Arc<dyn ClaimsService>, config: &FlowConfig) -> Self {
        Self {
            claims,
            store: Arc::new(InMemoryHandshakeStore::new()),
            ttl: Duration::seconds(config.handshake_ttl_seconds as i64),
            clock_skew: Duration::seconds(config.clock_skew_seconds as i64),
            single_use: config.single_use_handshake,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn HandshakeStore>) -> Self {
        self.store = store;
        self
    }

    /// Builds a fresh handshake and hands it to the claims service, which
    /// attaches it to `response`.
    pub async fn issue(
        &self,
        response: &mut HeaderMap,
        request: HandshakeRequest,
    ) -> FlowResult<IssuedHandshake> {
        let state = rand_token()
            .map_err(|e| FlowError::internal("failed to make oauth2 state").with_source(e))?;
        let claim_id = rand_token()
            .map_err(|e| FlowError::internal("failed to make claim's id").with_source(e))?;

        let now = Utc::now();
        let claims = Claims {
            id: claim_id,
            audience: request.audience,
            expires_at: (now + self.ttl).timestamp(),
            not_before: (now - self.clock_skew).timestamp(),
            session_only: request.session_only,
            no_avatar: request.no_avatar,
            handshake: Some(Handshake {
                state: state.clone(),
                from: request.from,
            }),
            ..Claims::default()
        };

        let token = self
            .claims
            .issue(response, claims.clone())
            .await
            .map_err(|e| FlowError::internal("failed to set token").with_source(e))?;

        Ok(IssuedHandshake {
            state,
            token,
            claims,
        })
    }

    /// Checks the handshake attached to `request` against the `state` the
    /// provider sent back, returning the handshake claims.
    pub async fn validate(&self, request: &HeaderMap, state: Option<&str>) -> FlowResult<Claims> {
        let (claims, _token) = self
            .claims
            .read(request)
            .await
            .map_err(|e| FlowError::forbidden("failed to get token").with_source(e))?;

        let Some(handshake) = claims.handshake.as_ref() else {
            return Err(FlowError::forbidden("invalid handshake token"));
        };

        if handshake.state.is_empty() || Some(handshake.state.as_str()) != state {
            return Err(FlowError::forbidden("unexpected state"));
        }

        if self.single_use {
            let expires_at = DateTime::from_timestamp(claims.expires_at, 0)
                .unwrap_or_else(|| Utc::now() + self.ttl);
            let first_use = self.store.consume(&claims.id, expires_at).await.map_err(|e| {
                FlowError::internal("failed to record handshake").with_source(e)
            })?;
            if !first_use {
                warn!("replayed handshake {}", claims.id);
                return Err(FlowError::forbidden("handshake already used"));
            }
        }

        debug!("token with state {}", handshake.state);
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{COOKIE, SET_COOKIE};
    use ras_identity_session::{JwtClaimsService, SessionConfig};

    fn manager(config: &FlowConfig) -> HandshakeManager {
        let claims = Arc::new(JwtClaimsService::new(SessionConfig {
            jwt_secret: "handshake-secret".to_string(),
            ..SessionConfig::default()
        }));
        HandshakeManager::new(claims, config)
    }

    /// Request headers carrying the cookie written into `response`.
    fn echo_cookie(response: &HeaderMap) -> HeaderMap {
        let set_cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        let pair = set_cookie.split(';').next().unwrap().to_string();

        let mut request = HeaderMap::new();
        request.insert(COOKIE, pair.parse().unwrap());
        request
    }

    fn login() -> HandshakeRequest {
        HandshakeRequest {
            from: "/dashboard".to_string(),
            audience: "site1".to_string(),
            ..HandshakeRequest::default()
        }
    }

    #[tokio::test]
    async fn test_issue_builds_handshake_claims() {
        let manager = manager(&FlowConfig::default());
        let mut response = HeaderMap::new();

        let issued = manager.issue(&mut response, login()).await.unwrap();
        let now = Utc::now().timestamp();

        assert_eq!(issued.state.len(), 64);
        assert_eq!(issued.claims.id.len(), 64);
        assert_ne!(issued.state, issued.claims.id);
        assert_eq!(issued.claims.audience, "site1");
        assert!((issued.claims.expires_at - (now + 1800)).abs() <= 2);
        assert!((issued.claims.not_before - (now - 60)).abs() <= 2);

        let handshake = issued.claims.handshake.unwrap();
        assert_eq!(handshake.state, issued.state);
        assert_eq!(handshake.from, "/dashboard");
        assert!(response.contains_key(SET_COOKIE));
    }

    #[tokio::test]
    async fn test_validate_matching_state() {
        let manager = manager(&FlowConfig::default());
        let mut response = HeaderMap::new();
        let issued = manager.issue(&mut response, login()).await.unwrap();

        let claims = manager
            .validate(&echo_cookie(&response), Some(&issued.state))
            .await
            .unwrap();
        assert_eq!(claims.id, issued.claims.id);
        assert_eq!(claims.handshake.unwrap().from, "/dashboard");
    }

    #[tokio::test]
    async fn test_validate_rejects_wrong_or_missing_state() {
        let manager = manager(&FlowConfig::default());
        let mut response = HeaderMap::new();
        manager.issue(&mut response, login()).await.unwrap();
        let request = echo_cookie(&response);

        for state in [Some("forged"), Some(""), None] {
            let err = manager.validate(&request, state).await.unwrap_err();
            assert_eq!(err.status, 403);
            assert_eq!(err.message, "unexpected state");
        }
    }

    #[tokio::test]
    async fn test_validate_without_token() {
        let manager = manager(&FlowConfig::default());

        let err = manager
            .validate(&HeaderMap::new(), Some("anything"))
            .await
            .unwrap_err();
        assert_eq!(err.status, 403);
        assert_eq!(err.message, "failed to get token");
    }

    #[tokio::test]
    async fn test_validate_rejects_replay() {
        let manager = manager(&FlowConfig::default());
        let mut response = HeaderMap::new();
        let issued = manager.issue(&mut response, login()).await.unwrap();
        let request = echo_cookie(&response);

        manager.validate(&request, Some(&issued.state)).await.unwrap();
        let err = manager
            .validate(&request, Some(&issued.state))
            .await
            .unwrap_err();
        assert_eq!(err.status, 403);
        assert_eq!(err.message, "handshake already used");
    }

    #[tokio::test]
    async fn test_replay_allowed_when_not_single_use() {
        let manager = manager(&FlowConfig::default().with_single_use_handshake(false));
        let mut response = HeaderMap::new();
        let issued = manager.issue(&mut response, login()).await.unwrap();
        let request = echo_cookie(&response);

        manager.validate(&request, Some(&issued.state)).await.unwrap();
        manager.validate(&request, Some(&issued.state)).await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_store_consume_once() {
        let store = InMemoryHandshakeStore::new();
        let expires_at = Utc::now() + Duration::minutes(30);

        assert!(store.consume("cid", expires_at).await.unwrap());
        assert!(!store.consume("cid", expires_at).await.unwrap());
        assert!(store.consume("other", expires_at).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_records_cleanup() {
        let store = InMemoryHandshakeStore::new();
        store
            .used
            .write()
            .await
            .insert("old".to_string(), Utc::now() - Duration::minutes(1));
        store
            .consume("fresh", Utc::now() + Duration::minutes(30))
            .await
            .unwrap();
        store
            .used
            .write()
            .await
            .insert("stale".to_string(), Utc::now() - Duration::minutes(1));

        let cleaned = store.cleanup_expired().await.unwrap();
        assert_eq!(cleaned, 1);
        assert_eq!(store.used.read().await.len(), 1);
    }
}
