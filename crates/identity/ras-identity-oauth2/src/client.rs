//! OAuth2 client: authorization URLs, code exchange and the authorized resource client.

use crate::config::{AuthStyle, Endpoint, ProviderCredentials};
use crate::error::{OAuth2Error, OAuth2Result};
use crate::mapper::ResourceClient;
use crate::types::TokenResponse;
use async_trait::async_trait;
use rand::RngCore;
use rand::rngs::OsRng;
use reqwest::Client;
use reqwest::header::ACCEPT;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

/// Random token from the OS source: 32 bytes, hex encoded.
pub fn rand_token() -> OAuth2Result<String> {
    let mut bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}

/// OAuth2 client for one provider
#[derive(Clone)]
pub struct OAuth2Client {
    http_client: Client,
    credentials: ProviderCredentials,
    endpoint: Endpoint,
    scopes: Vec<String>,
}

impl OAuth2Client {
    pub fn new(
        credentials: ProviderCredentials,
        endpoint: Endpoint,
        scopes: Vec<String>,
        http_timeout_seconds: u64,
    ) -> OAuth2Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(http_timeout_seconds))
            .user_agent(concat!("ras-identity-oauth2/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OAuth2Error::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            credentials,
            endpoint,
            scopes,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.credentials.client_id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Authorization URL the browser is sent to, carrying `state`.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> OAuth2Result<String> {
        let mut url = Url::parse(&self.endpoint.auth_url)?;

        let mut params = url.query_pairs_mut();
        params.append_pair("response_type", "code");
        params.append_pair("client_id", &self.credentials.client_id);
        params.append_pair("redirect_uri", redirect_uri);
        if !self.scopes.is_empty() {
            params.append_pair("scope", &self.scopes.join(" "));
        }
        params.append_pair("state", state);
        drop(params);

        Ok(url.to_string())
    }

    /// Exchange authorization code for tokens
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> OAuth2Result<TokenResponse> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", redirect_uri);

        let mut request = self
            .http_client
            .post(&self.endpoint.token_url)
            .header(ACCEPT, "application/json");

        match self.endpoint.auth_style {
            AuthStyle::InParams => {
                params.insert("client_id", &self.credentials.client_id);
                params.insert("client_secret", &self.credentials.client_secret);
            }
            AuthStyle::InHeader => {
                request = request.basic_auth(
                    &self.credentials.client_id,
                    Some(&self.credentials.client_secret),
                );
            }
        }

        let response = request.form(&params).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Token exchange failed: {}", error_text);
            return Err(OAuth2Error::TokenExchangeFailed(error_text));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuth2Error::InvalidTokenResponse(e.to_string()))?;

        if token_response.access_token.is_empty() {
            return Err(OAuth2Error::InvalidTokenResponse(
                "empty access token".to_string(),
            ));
        }

        info!("Successfully exchanged code for tokens");
        Ok(token_response)
    }

    /// Client sending the access token with every resource request.
    pub fn authorized(&self, token: &TokenResponse) -> AuthorizedClient {
        AuthorizedClient {
            http_client: self.http_client.clone(),
            access_token: token.access_token.clone(),
        }
    }
}

/// Bearer-token client handed to mappers and avatar savers.
#[derive(Clone)]
pub struct AuthorizedClient {
    http_client: Client,
    access_token: String,
}

#[async_trait]
impl ResourceClient for AuthorizedClient {
    async fn get(&self, url: &str) -> reqwest::Result<reqwest::Response> {
        debug!("fetching {}", url);
        self.http_client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(endpoint: Endpoint) -> OAuth2Client {
        OAuth2Client::new(
            ProviderCredentials::new("test_client_id", "test_secret"),
            endpoint,
            vec!["user:email".to_string(), "read:user".to_string()],
            5,
        )
        .unwrap()
    }

    #[test]
    fn test_rand_token() {
        let first = rand_token().unwrap();
        let second = rand_token().unwrap();

        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }

    #[test]
    fn test_authorization_url_generation() {
        let client = test_client(Endpoint::new(
            "https://example.com/auth",
            "https://example.com/token",
        ));

        let auth_url = client
            .authorization_url("http://localhost:8080/auth/test/callback", "state123")
            .unwrap();

        // Verify URL structure
        let url = Url::parse(&auth_url).unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/auth");

        // Verify query parameters
        let params: HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(params.get("response_type"), Some(&"code".into()));
        assert_eq!(params.get("client_id"), Some(&"test_client_id".into()));
        assert_eq!(
            params.get("redirect_uri"),
            Some(&"http://localhost:8080/auth/test/callback".into())
        );
        assert_eq!(params.get("state"), Some(&"state123".into()));
        assert_eq!(params.get("scope"), Some(&"user:email read:user".into()));
    }

    #[tokio::test]
    async fn test_exchange_code_with_params() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("Accept", "application/json"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the_code"))
            .and(body_string_contains("client_secret=test_secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "mock_access_token",
                "token_type": "bearer",
                "scope": "user:email"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(Endpoint::new(
            format!("{}/authorize", mock_server.uri()),
            format!("{}/token", mock_server.uri()),
        ));

        let token = client
            .exchange_code("the_code", "http://localhost/callback")
            .await
            .unwrap();
        assert_eq!(token.access_token, "mock_access_token");
    }

    #[tokio::test]
    async fn test_exchange_code_with_basic_auth() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "mock_access_token"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(
            Endpoint::new(
                format!("{}/authorize", mock_server.uri()),
                format!("{}/token", mock_server.uri()),
            )
            .with_auth_style(AuthStyle::InHeader),
        );

        let token = client
            .exchange_code("the_code", "http://localhost/callback")
            .await
            .unwrap();
        assert_eq!(token.access_token, "mock_access_token");
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad_verification_code"))
            .mount(&mock_server)
            .await;

        let client = test_client(Endpoint::new(
            format!("{}/authorize", mock_server.uri()),
            format!("{}/token", mock_server.uri()),
        ));

        let result = client.exchange_code("stale", "http://localhost/callback").await;
        assert!(matches!(
            result,
            Err(OAuth2Error::TokenExchangeFailed(text)) if text == "bad_verification_code"
        ));
    }

    #[tokio::test]
    async fn test_authorized_client_sends_bearer_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("Authorization", "Bearer mock_access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"login": "jane"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(Endpoint::new("https://example.com/a", "https://example.com/t"));
        let authorized = client.authorized(&TokenResponse {
            access_token: "mock_access_token".to_string(),
            token_type: "bearer".to_string(),
            expires_in: None,
            refresh_token: None,
            scope: None,
        });

        let response = authorized
            .get(&format!("{}/user", mock_server.uri()))
            .await
            .unwrap();
        assert!(response.status().is_success());
    }
}
