//! OAuth2 configuration types.

use crate::mapper::InfoMapper;
use std::fmt;
use std::sync::Arc;

/// How client credentials are sent to the token endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthStyle {
    /// `client_id` and `client_secret` in the form body.
    #[default]
    InParams,
    /// HTTP basic authentication.
    InHeader,
}

#[derive(Debug, Clone)]
pub struct Endpoint {
    pub auth_url: String,
    pub token_url: String,
    pub auth_style: AuthStyle,
}

impl Endpoint {
    pub fn new(auth_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        Self {
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            auth_style: AuthStyle::default(),
        }
    }

    pub fn with_auth_style(mut self, auth_style: AuthStyle) -> Self {
        self.auth_style = auth_style;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ProviderCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

/// Catalog entry describing one identity provider.
///
/// `mappers` run in order on every callback; each one fetches a resource and
/// folds it into the user being built.
#[derive(Clone)]
pub struct ProviderSpec {
    pub name: String,
    pub endpoint: Endpoint,
    pub scopes: Vec<String>,
    pub mappers: Vec<Arc<dyn InfoMapper>>,
}

impl ProviderSpec {
    pub fn new(name: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            name: name.into(),
            endpoint,
            scopes: Vec::new(),
            mappers: Vec::new(),
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mapper(mut self, mapper: impl InfoMapper + 'static) -> Self {
        self.mappers.push(Arc::new(mapper));
        self
    }
}

impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("scopes", &self.scopes)
            .field(
                "mappers",
                &self.mappers.iter().map(|m| m.url()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Settings shared by every provider mounted on a service.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Public root URL of this service, used to build callback URLs.
    pub url: String,
    /// `iss` of issued session claims.
    pub issuer: String,
    /// Bound on every outbound call (token exchange and mapper fetches).
    pub http_timeout_seconds: u64,
    pub handshake_ttl_seconds: u64,
    /// How far back a handshake's not-before is set.
    pub clock_skew_seconds: u64,
    /// Reject a second callback carrying an already validated handshake.
    pub single_use_handshake: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            issuer: "ras-identity".to_string(),
            http_timeout_seconds: 10,
            handshake_ttl_seconds: 1800, // 30 minutes
            clock_skew_seconds: 60,
            single_use_handshake: true,
        }
    }
}

impl FlowConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.http_timeout_seconds = seconds;
        self
    }

    pub fn with_handshake_ttl(mut self, seconds: u64) -> Self {
        self.handshake_ttl_seconds = seconds;
        self
    }

    pub fn with_clock_skew(mut self, seconds: u64) -> Self {
        self.clock_skew_seconds = seconds;
        self
    }

    pub fn with_single_use_handshake(mut self, single_use: bool) -> Self {
        self.single_use_handshake = single_use;
        self
    }
}
