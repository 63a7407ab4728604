//! How the browser is sent to the provider's authorization page.

use axum::http::header::LOCATION;
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Turns a login URL into the response that sends the browser there.
pub trait RedirectStrategy: Send + Sync {
    fn redirect(&self, request: &Parts, target: &str) -> Response;
}

/// Plain `302 Found` with a `Location` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct FoundRedirect;

impl RedirectStrategy for FoundRedirect {
    fn redirect(&self, _request: &Parts, target: &str) -> Response {
        match HeaderValue::from_str(target) {
            Ok(location) => (StatusCode::FOUND, [(LOCATION, location)]).into_response(),
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl<F> RedirectStrategy for F
where
    F: Fn(&Parts, &str) -> Response + Send + Sync,
{
    fn redirect(&self, request: &Parts, target: &str) -> Response {
        self(request, target)
    }
}
