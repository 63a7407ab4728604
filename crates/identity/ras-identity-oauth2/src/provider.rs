//! Login, callback and logout for one OAuth2 identity provider.

use crate::client::{OAuth2Client, rand_token};
use crate::config::{FlowConfig, ProviderCredentials, ProviderSpec};
use crate::error::{BoxError, FlowError, FlowResult, OAuth2Result};
use crate::mapper::{MapperPipeline, ResourceClient};
use crate::redirect::{FoundRedirect, RedirectStrategy};
use crate::state::{HandshakeManager, HandshakeRequest, HandshakeStore};
use crate::types::{CallbackQuery, LoginQuery};
use async_trait::async_trait;
use axum::extract::{OriginalUri, Query, State};
use axum::http::header::LOCATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use ras_identity_core::{Claims, ClaimsService, User, UserData};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

const CALLBACK_SUFFIX: &str = "/callback";

/// Stores the user's picture somewhere stable and returns the user pointing at it.
#[async_trait]
pub trait AvatarSaver: Send + Sync {
    async fn save(&self, user: User, client: &dyn ResourceClient) -> Result<User, BoxError>;
}

/// Hook run on the aggregated user data before the session is issued.
///
/// Returning a [`FlowError`] controls the response status; any other error is a 500.
pub type AfterReceiveFn = Arc<dyn Fn(&mut UserData) -> Result<(), BoxError> + Send + Sync>;

/// OAuth2 provider serving `/login`, `/callback` and `/logout`.
pub struct OAuth2Provider {
    spec: ProviderSpec,
    config: FlowConfig,
    client: OAuth2Client,
    handshakes: HandshakeManager,
    claims: Arc<dyn ClaimsService>,
    redirect: Arc<dyn RedirectStrategy>,
    avatar_saver: Option<Arc<dyn AvatarSaver>>,
    after_receive: Option<AfterReceiveFn>,
}

impl OAuth2Provider {
    pub fn new(
        spec: ProviderSpec,
        credentials: ProviderCredentials,
        config: FlowConfig,
        claims: Arc<dyn ClaimsService>,
    ) -> OAuth2Result<Self> {
        info!("init oauth2 service {}", spec.name);

        let client = OAuth2Client::new(
            credentials,
            spec.endpoint.clone(),
            spec.scopes.clone(),
            config.http_timeout_seconds,
        )?;
        let handshakes = HandshakeManager::new(claims.clone(), &config);

        let provider = Self {
            spec,
            config,
            client,
            handshakes,
            claims,
            redirect: Arc::new(FoundRedirect),
            avatar_saver: None,
            after_receive: None,
        };

        debug!(
            "created {} oauth2, id={}, redir={}, endpoint={:?}",
            provider.name(),
            provider.client.client_id(),
            provider.callback_url(&format!("/{{route}}/{}/", provider.name())),
            provider.client.endpoint()
        );
        Ok(provider)
    }

    pub fn with_redirect(mut self, redirect: impl RedirectStrategy + 'static) -> Self {
        self.redirect = Arc::new(redirect);
        self
    }

    pub fn with_avatar_saver(mut self, saver: Arc<dyn AvatarSaver>) -> Self {
        self.avatar_saver = Some(saver);
        self
    }

    pub fn with_after_receive<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut UserData) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.after_receive = Some(Arc::new(hook));
        self
    }

    pub fn with_handshake_store(mut self, store: Arc<dyn HandshakeStore>) -> Self {
        self.handshakes = self.handshakes.with_store(store);
        self
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// This service's callback URL for a request to `path`: the last path
    /// segment is swapped for `/callback` and prefixed with the public root URL,
    /// e.g. `/auth/github/login` becomes `http://localhost:8080/auth/github/callback`.
    pub fn callback_url(&self, path: &str) -> String {
        let parent = path.rsplit_once('/').map(|(head, _)| head).unwrap_or("");
        let root = self.config.url.strip_suffix('/').unwrap_or(&self.config.url);
        let parent = parent.strip_suffix('/').unwrap_or(parent);

        format!("{root}{parent}{CALLBACK_SUFFIX}")
    }

    /// `GET /login?from=&aud=&session=&noava=`
    pub async fn login(&self, request: &Parts) -> FlowResult<Response> {
        debug!("login with {}", self.name());
        let query: LoginQuery = parse_query(request)?;

        let mut headers = HeaderMap::new();
        let issued = self
            .handshakes
            .issue(
                &mut headers,
                HandshakeRequest {
                    from: query.from.clone().unwrap_or_default(),
                    audience: query.audience(),
                    session_only: query.session_only(),
                    no_avatar: query.no_avatar(),
                },
            )
            .await?;

        let redirect_uri = self.callback_url(request_path(request));
        let login_url = self
            .client
            .authorization_url(&redirect_uri, &issued.state)
            .map_err(|e| FlowError::internal("failed to make login url").with_source(e))?;

        debug!("login url {}, claims={:?}", login_url, issued.claims);
        let response = self.redirect.redirect(request, &login_url);
        Ok(with_headers(response, headers))
    }

    /// `GET /callback?state=&code=`
    pub async fn callback(&self, request: &Parts) -> FlowResult<Response> {
        let query: CallbackQuery = parse_query(request)?;
        let handshake = self
            .handshakes
            .validate(&request.headers, query.state.as_deref())
            .await?;

        if let Some(error) = query.error.as_deref() {
            let description = query.error_description.clone().unwrap_or_default();
            return Err(FlowError::forbidden("provider denied authorization")
                .with_source(format!("{error}: {description}")));
        }
        let code = query
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| FlowError::bad_request("missing authorization code"))?;

        let redirect_uri = self.callback_url(request_path(request));
        let token = self
            .client
            .exchange_code(code, &redirect_uri)
            .await
            .map_err(|e| FlowError::internal("exchange failed").with_source(e))?;
        let client = self.client.authorized(&token);

        let mut user_data = MapperPipeline::new(&client)
            .run(&self.spec.mappers)
            .await?
            .into_user_data()?;
        user_data.social = self.name().to_string();

        if handshake.no_avatar {
            user_data.user.picture.clear();
        }

        if let Some(saver) = &self.avatar_saver {
            let user = std::mem::take(&mut user_data.user);
            user_data.user = saver.save(user, &client).await.map_err(|e| {
                FlowError::internal("failed to save avatar to proxy").with_source(e)
            })?;
        }

        if let Some(hook) = &self.after_receive {
            hook(&mut user_data).map_err(FlowError::from_hook)?;
        }

        let claim_id = rand_token()
            .map_err(|e| FlowError::internal("failed to make claim's id").with_source(e))?;
        let session = Claims {
            id: claim_id,
            issuer: self.config.issuer.clone(),
            audience: handshake.audience.clone(),
            session_only: handshake.session_only,
            no_avatar: handshake.no_avatar,
            user: Some(user_data.user.clone()),
            ..Claims::default()
        };

        let mut headers = HeaderMap::new();
        self.claims
            .issue(&mut headers, session)
            .await
            .map_err(|e| FlowError::internal("failed to set token").with_source(e))?;

        debug!("user info {:?}", user_data.user);

        let from = handshake
            .handshake
            .as_ref()
            .map(|h| h.from.as_str())
            .unwrap_or_default();
        if !from.is_empty() {
            let location = HeaderValue::from_str(from).map_err(|e| {
                FlowError::bad_request("invalid redirect target").with_source(e)
            })?;
            headers.insert(LOCATION, location);
            return Ok((StatusCode::TEMPORARY_REDIRECT, headers).into_response());
        }

        Ok((headers, Json(user_data.user)).into_response())
    }

    /// `GET /logout`
    pub async fn logout(&self, request: &Parts) -> FlowResult<Response> {
        self.claims
            .read(&request.headers)
            .await
            .map_err(|e| FlowError::forbidden("logout not allowed").with_source(e))?;

        let mut headers = HeaderMap::new();
        self.claims.clear(&mut headers).await;
        Ok((StatusCode::OK, headers).into_response())
    }

    /// Routes for this provider, to be nested under e.g. `/auth/<name>`.
    pub fn router(self) -> Router {
        Router::new()
            .route("/login", get(login_handler))
            .route("/callback", get(callback_handler))
            .route("/logout", get(logout_handler))
            .with_state(Arc::new(self))
    }
}

async fn login_handler(
    State(provider): State<Arc<OAuth2Provider>>,
    parts: Parts,
) -> Result<Response, FlowError> {
    provider.login(&parts).await
}

async fn callback_handler(
    State(provider): State<Arc<OAuth2Provider>>,
    parts: Parts,
) -> Result<Response, FlowError> {
    provider.callback(&parts).await
}

async fn logout_handler(
    State(provider): State<Arc<OAuth2Provider>>,
    parts: Parts,
) -> Result<Response, FlowError> {
    provider.logout(&parts).await
}

fn parse_query<T: DeserializeOwned>(request: &Parts) -> FlowResult<T> {
    Query::try_from_uri(&request.uri)
        .map(|Query(query)| query)
        .map_err(|e| FlowError::bad_request("invalid query").with_source(e))
}

/// Full request path, including any prefix stripped by `Router::nest`.
fn request_path(request: &Parts) -> &str {
    request
        .extensions
        .get::<OriginalUri>()
        .map(|uri| uri.path())
        .unwrap_or_else(|| request.uri.path())
}

fn with_headers(mut response: Response, headers: HeaderMap) -> Response {
    for (name, value) in headers.iter() {
        response.headers_mut().append(name, value.clone());
    }
    response
}
