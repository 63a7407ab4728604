use anyhow::{Context, Result};
use axum::{Json, Router};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use ras_identity_core::{ClaimsService, User};
use ras_identity_oauth2::{OAuth2Provider, providers};
use ras_identity_session::{JwtClaimsService, SessionConfig};
use std::sync::Arc;
use tracing::{info, warn};

mod config;

use config::AppConfig;

/// Current session's user, or 401.
async fn me_handler(
    State(claims): State<Arc<dyn ClaimsService>>,
    headers: HeaderMap,
) -> Result<Json<User>, StatusCode> {
    match claims.read(&headers).await {
        Ok((claims, _)) => claims.user.map(Json).ok_or(StatusCode::UNAUTHORIZED),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env()?;
    info!("Starting federation server at {}", config.url);

    let claims: Arc<dyn ClaimsService> = Arc::new(JwtClaimsService::new(SessionConfig {
        jwt_secret: config.jwt_secret.clone(),
        ..SessionConfig::default()
    }));

    let mut app = Router::new().route("/me", get(me_handler).with_state(claims.clone()));

    for (name, credentials) in &config.providers {
        let Some(spec) = providers::by_name(name) else {
            continue;
        };
        let provider =
            OAuth2Provider::new(spec, credentials.clone(), config.flow_config(), claims.clone())
                .with_context(|| format!("failed to create {name} provider"))?;

        app = app.nest(&format!("/auth/{name}"), provider.router());
        info!("Mounted {} at /auth/{}/login", name, name);
    }

    if config.providers.is_empty() {
        warn!("No provider credentials configured, set e.g. GITHUB_CLIENT_ID and GITHUB_CLIENT_SECRET");
    }

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", config.bind_address());

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
