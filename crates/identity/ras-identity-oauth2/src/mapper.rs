//! Profile mappers and the pipeline that runs them against an authorized client.

use crate::error::{FlowError, FlowResult};
use async_trait::async_trait;
use ras_identity_core::{User, UserData};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// HTTP client already carrying the provider's authorization.
///
/// OAuth2 uses a bearer token; any other scheme (OAuth1 signatures, API keys)
/// only has to implement this to reuse the mappers.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn get(&self, url: &str) -> reqwest::Result<reqwest::Response>;
}

type ExtractFn<T> = dyn Fn(&mut UserData, T, &[u8]) -> FlowResult<User> + Send + Sync;

/// One provider resource and how to turn its payload into a user.
///
/// The extraction function receives the accumulated user data, the decoded
/// payload and the raw body, and returns the user record to fold in.
pub struct Mapper<T> {
    url: String,
    extract: Box<ExtractFn<T>>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Mapper<T>
where
    T: DeserializeOwned,
{
    pub fn new<F>(url: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&mut UserData, T, &[u8]) -> FlowResult<User> + Send + Sync + 'static,
    {
        Self {
            url: url.into(),
            extract: Box::new(extract),
            _payload: PhantomData,
        }
    }
}

/// Type-erased mapper, so one provider can chain payloads of different shapes.
pub trait InfoMapper: Send + Sync {
    fn url(&self) -> &str;

    /// Decodes `body`, records it as raw data and folds the extracted user in.
    fn apply(&self, user_data: &mut UserData, body: &[u8]) -> FlowResult<()>;
}

impl<T> InfoMapper for Mapper<T>
where
    T: DeserializeOwned,
{
    fn url(&self) -> &str {
        &self.url
    }

    fn apply(&self, user_data: &mut UserData, body: &[u8]) -> FlowResult<()> {
        let raw: Value = serde_json::from_slice(body)
            .map_err(|e| FlowError::bad_payload("failed to unmarshal user info").with_source(e))?;
        let payload: T = serde_json::from_value(raw.clone())
            .map_err(|e| FlowError::bad_payload("failed to unmarshal user info").with_source(e))?;

        debug!("got raw info from [{}] {}", self.url, raw);
        user_data.set_raw(self.url.clone(), raw);

        let user = (self.extract)(user_data, payload, body)?;
        user_data.apply_user(user);
        Ok(())
    }
}

/// State threaded through the mappers of one callback.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    pub user_data: Option<UserData>,
}

impl PipelineContext {
    pub fn into_user_data(self) -> FlowResult<UserData> {
        self.user_data
            .ok_or_else(|| FlowError::internal("context is empty"))
    }
}

/// Runs mappers in order, stopping at the first failure.
pub struct MapperPipeline<'a> {
    client: &'a dyn ResourceClient,
}

impl<'a> MapperPipeline<'a> {
    pub fn new(client: &'a dyn ResourceClient) -> Self {
        Self { client }
    }

    pub async fn run(&self, mappers: &[Arc<dyn InfoMapper>]) -> FlowResult<PipelineContext> {
        let mut context = PipelineContext::default();
        for mapper in mappers {
            context = self.step(context, mapper.as_ref()).await?;
        }
        Ok(context)
    }

    async fn step(
        &self,
        context: PipelineContext,
        mapper: &dyn InfoMapper,
    ) -> FlowResult<PipelineContext> {
        let body = self.fetch(mapper.url()).await?;

        let mut user_data = context.user_data.unwrap_or_default();
        mapper.apply(&mut user_data, &body)?;

        Ok(PipelineContext {
            user_data: Some(user_data),
        })
    }

    async fn fetch(&self, url: &str) -> FlowResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .await
            .map_err(|e| FlowError::unavailable("failed to get client info").with_source(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(
                FlowError::unavailable(format!("provider returned {}", status.as_u16()))
                    .with_source(text),
            );
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FlowError::internal("failed to read user info").with_source(e))?;
        Ok(body.to_vec())
    }
}
