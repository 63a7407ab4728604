//! OAuth2 federated login.
//!
//! An [`OAuth2Provider`] drives the authorization-code handshake against one
//! identity provider: `/login` binds a random `state` into signed handshake
//! claims and redirects to the provider, `/callback` validates that state,
//! exchanges the code, runs the provider's [`Mapper`]s to aggregate a
//! [`UserData`](ras_identity_core::UserData) and issues session claims, and
//! `/logout` clears the session. Claims signing and storage are delegated to a
//! [`ClaimsService`](ras_identity_core::ClaimsService).
//!
//! ```no_run
//! use ras_identity_oauth2::{FlowConfig, OAuth2Provider, ProviderCredentials, providers};
//! use ras_identity_session::{JwtClaimsService, SessionConfig};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let claims = Arc::new(JwtClaimsService::new(SessionConfig::default()));
//! let github = OAuth2Provider::new(
//!     providers::github(),
//!     ProviderCredentials::new("client-id", "client-secret"),
//!     FlowConfig::new("http://localhost:8080"),
//!     claims,
//! )?;
//! let app = axum::Router::<()>::new().nest("/auth/github", github.router());
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod mapper;
mod provider;
pub mod providers;
mod redirect;
mod state;
mod types;


pub use client::{AuthorizedClient, OAuth2Client, rand_token};
pub use config::{AuthStyle, Endpoint, FlowConfig, ProviderCredentials, ProviderSpec};
pub use error::{BoxError, ErrorKind, FlowError, FlowResult, OAuth2Error, OAuth2Result};
pub use mapper::{InfoMapper, Mapper, MapperPipeline, PipelineContext, ResourceClient};
pub use provider::{AfterReceiveFn, AvatarSaver, OAuth2Provider};
pub use redirect::{FoundRedirect, RedirectStrategy};
pub use state::{
    HandshakeManager, HandshakeRequest, HandshakeStore, InMemoryHandshakeStore, IssuedHandshake,
};
pub use types::{CallbackQuery, ErrorBody, LoginQuery, RawUserInfo, TokenResponse};

// Re-export common types for convenience
pub use ras_identity_core::{Claims, ClaimsService, User, UserData};
