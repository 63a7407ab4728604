//! Claims service that signs handshake and session claims as JWTs and keeps them
//! in a cookie.

use async_trait::async_trait;
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use cookie::{Cookie, SameSite};
use http::header::{HeaderValue, SET_COOKIE};
use http::HeaderMap;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use ras_identity_core::{Claims, ClaimsError, ClaimsResult, ClaimsService};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub jwt_secret: String,
    /// Lifetime of claims issued without an explicit expiry.
    pub jwt_ttl: Duration,
    pub algorithm: Algorithm,
    pub cookie_name: String,
    /// Request header checked before the cookie.
    pub header_name: String,
    pub cookie_path: String,
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me-in-production".to_string(),
            jwt_ttl: Duration::hours(24),
            algorithm: Algorithm::HS256,
            cookie_name: "JWT".to_string(),
            header_name: "x-jwt".to_string(),
            cookie_path: "/".to_string(),
            secure_cookie: false,
        }
    }
}

pub struct JwtClaimsService {
    config: SessionConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtClaimsService {
    pub fn new(config: SessionConfig) -> Self {
        let mut validation = Validation::new(config.algorithm);
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Signs claims without touching any response.
    pub fn encode(&self, claims: &Claims) -> ClaimsResult<String> {
        encode(&Header::new(self.config.algorithm), claims, &self.encoding_key)
            .map_err(|e| ClaimsError::Signing(e.to_string()))
    }

    /// Verifies a token and returns its claims.
    pub fn decode(&self, token: &str) -> ClaimsResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ClaimsError::Expired,
                _ => ClaimsError::Invalid(e.to_string()),
            })
    }

    fn token_from_request(&self, request: &HeaderMap) -> Option<String> {
        if let Some(token) = request
            .get(self.config.header_name.as_str())
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
        {
            return Some(token.to_string());
        }

        CookieJar::from_headers(request)
            .get(&self.config.cookie_name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }

    fn set_cookie(response: &mut HeaderMap, cookie: Cookie<'_>) -> ClaimsResult<()> {
        let value = HeaderValue::from_str(&cookie.to_string())
            .map_err(|e| ClaimsError::Signing(e.to_string()))?;
        response.append(SET_COOKIE, value);
        Ok(())
    }
}

#[async_trait]
impl ClaimsService for JwtClaimsService {
    async fn issue(&self, response: &mut HeaderMap, mut claims: Claims) -> ClaimsResult<String> {
        let now = Utc::now();
        if claims.issued_at == 0 {
            claims.issued_at = now.timestamp();
        }
        if claims.expires_at == 0 {
            claims.expires_at = (now + self.config.jwt_ttl).timestamp();
        }
        if claims.not_before == 0 {
            claims.not_before = (now - Duration::minutes(1)).timestamp();
        }

        let token = self.encode(&claims)?;

        let mut builder = Cookie::build((self.config.cookie_name.clone(), token.clone()))
            .path(self.config.cookie_path.clone())
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.config.secure_cookie);
        // Session-only tokens live as long as the browser session.
        if !claims.session_only {
            let max_age = (claims.expires_at - now.timestamp()).max(0);
            builder = builder.max_age(cookie::time::Duration::seconds(max_age));
        }
        Self::set_cookie(response, builder.build())?;

        debug!("issued token jti={} aud={}", claims.id, claims.audience);
        Ok(token)
    }

    async fn read(&self, request: &HeaderMap) -> ClaimsResult<(Claims, String)> {
        let token = self.token_from_request(request).ok_or(ClaimsError::Missing)?;
        let claims = self.decode(&token)?;
        Ok((claims, token))
    }

    async fn clear(&self, response: &mut HeaderMap) {
        let cookie = Cookie::build((self.config.cookie_name.clone(), ""))
            .path(self.config.cookie_path.clone())
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.config.secure_cookie)
            .max_age(cookie::time::Duration::ZERO)
            .build();

        if let Err(e) = Self::set_cookie(response, cookie) {
            warn!("failed to reset token cookie: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::COOKIE;
    use ras_identity_core::{Handshake, User};

    fn request_with_cookie(response: &HeaderMap) -> HeaderMap {
        let set_cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        let pair = set_cookie.split(';').next().unwrap();
        let mut request = HeaderMap::new();
        request.insert(COOKIE, HeaderValue::from_str(pair).unwrap());
        request
    }

    #[tokio::test]
    async fn test_issue_and_read_roundtrip() {
        let service = JwtClaimsService::new(SessionConfig::default());
        let claims = Claims {
            id: "cid".to_string(),
            audience: "site1".to_string(),
            handshake: Some(Handshake {
                state: "state123".to_string(),
                from: "/dashboard".to_string(),
            }),
            ..Claims::default()
        };

        let mut response = HeaderMap::new();
        let token = service.issue(&mut response, claims).await.unwrap();

        let set_cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with("JWT="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Max-Age="));

        let (read, read_token) = service.read(&request_with_cookie(&response)).await.unwrap();
        assert_eq!(read_token, token);
        assert_eq!(read.id, "cid");
        assert_eq!(read.audience, "site1");
        assert_eq!(read.handshake.unwrap().state, "state123");
        assert!(read.expires_at > read.issued_at);
    }

    #[tokio::test]
    async fn test_session_only_cookie_has_no_max_age() {
        let service = JwtClaimsService::new(SessionConfig::default());
        let claims = Claims {
            id: "cid".to_string(),
            session_only: true,
            user: Some(User::default()),
            ..Claims::default()
        };

        let mut response = HeaderMap::new();
        service.issue(&mut response, claims).await.unwrap();

        let set_cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(!set_cookie.contains("Max-Age"));
    }

    #[tokio::test]
    async fn test_header_token_is_accepted() {
        let service = JwtClaimsService::new(SessionConfig::default());
        let token = service
            .issue(
                &mut HeaderMap::new(),
                Claims {
                    id: "from-header".to_string(),
                    ..Claims::default()
                },
            )
            .await
            .unwrap();

        let mut request = HeaderMap::new();
        request.insert("x-jwt", HeaderValue::from_str(&token).unwrap());

        let (claims, _) = service.read(&request).await.unwrap();
        assert_eq!(claims.id, "from-header");
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let service = JwtClaimsService::new(SessionConfig::default());
        let now = Utc::now();
        let token = service
            .encode(&Claims {
                id: "old".to_string(),
                issued_at: (now - Duration::hours(2)).timestamp(),
                expires_at: (now - Duration::hours(1)).timestamp(),
                not_before: (now - Duration::hours(2)).timestamp(),
                ..Claims::default()
            })
            .unwrap();

        let mut request = HeaderMap::new();
        request.insert("x-jwt", HeaderValue::from_str(&token).unwrap());

        assert!(matches!(
            service.read(&request).await,
            Err(ClaimsError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_foreign_signature_is_rejected() {
        let issuer = JwtClaimsService::new(SessionConfig {
            jwt_secret: "other-secret".to_string(),
            ..SessionConfig::default()
        });
        let service = JwtClaimsService::new(SessionConfig::default());

        let mut response = HeaderMap::new();
        issuer
            .issue(
                &mut response,
                Claims {
                    id: "cid".to_string(),
                    ..Claims::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            service.read(&request_with_cookie(&response)).await,
            Err(ClaimsError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_token() {
        let service = JwtClaimsService::new(SessionConfig::default());
        assert!(matches!(
            service.read(&HeaderMap::new()).await,
            Err(ClaimsError::Missing)
        ));
    }

    #[tokio::test]
    async fn test_clear_expires_cookie() {
        let service = JwtClaimsService::new(SessionConfig::default());
        let mut response = HeaderMap::new();
        service.clear(&mut response).await;

        let set_cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with("JWT=;"));
        assert!(set_cookie.contains("Max-Age=0"));
    }
}
