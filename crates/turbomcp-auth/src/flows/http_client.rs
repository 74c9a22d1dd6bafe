//! HTTP client adapter for the `oauth2` crate
//!
//! `oauth2` builds token and authorization requests as `http` types and hands
//! them to an [`AsyncHttpClient`]. This adapter sends them through the same
//! [`Fetch`] collaborator every other authority call uses, so default
//! headers, timeouts and test doubles apply to grant requests too.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use oauth2::AsyncHttpClient;
use oauth2::http::{self, StatusCode};
use tracing::trace;

use crate::error::FetchError;
use crate::fetch::{Fetch, FetchRequest, Method};

/// Type alias for the HTTP request used by oauth2
pub type HttpRequest = http::Request<Vec<u8>>;
/// Type alias for the HTTP response used by oauth2
pub type HttpResponse = http::Response<Vec<u8>>;

/// [`Fetch`]-backed `oauth2` HTTP client
#[derive(Clone)]
pub struct OAuth2HttpClient {
    fetch: Arc<dyn Fetch>,
}

impl fmt::Debug for OAuth2HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2HttpClient")
            .field("fetch", &"<dyn Fetch>")
            .finish()
    }
}

impl OAuth2HttpClient {
    /// Client sending every request through `fetch`
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self { fetch }
    }

    /// Convert the `oauth2` request, fetch it, and convert the response back
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let (parts, body) = request.into_parts();

        let method = match parts.method.as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            other => return Err(FetchError::Other(format!("unsupported HTTP method {other}"))),
        };
        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let request = FetchRequest {
            method,
            path: parts.uri.to_string(),
            headers,
            body: (!body.is_empty()).then_some(body),
        };

        let response = self.fetch.fetch(request).await?;
        trace!(status = response.status, "Grant endpoint responded");

        let status = StatusCode::from_u16(response.status)
            .map_err(|e| FetchError::Other(format!("invalid status code: {e}")))?;
        let mut builder = http::Response::builder().status(status);
        for (name, value) in &response.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
            .body(response.body)
            .map_err(|e| FetchError::Other(format!("invalid response header: {e}")))
    }
}

/// Future type for the OAuth2 HTTP client
pub type OAuth2HttpFuture<'c> =
    Pin<Box<dyn Future<Output = Result<HttpResponse, FetchError>> + Send + 'c>>;

impl<'c> AsyncHttpClient<'c> for OAuth2HttpClient {
    type Error = FetchError;
    type Future = OAuth2HttpFuture<'c>;

    fn call(&'c self, request: HttpRequest) -> Self::Future {
        Box::pin(async move { self.execute(request).await })
    }
}
