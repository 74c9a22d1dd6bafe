//! HTTP collaborator used for every call to the authority
//!
//! [`Fetch`] is the seam between the authentication logic and the network.
//! [`HttpFetch`] is the reqwest-backed implementation; tests substitute their
//! own.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::OAuth2ClientConfig;
use crate::error::{AuthError, FetchError, Result};

/// HTTP method of a [`FetchRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`, used for the JWK Set
    Get,
    /// `POST` with a form body
    Post,
}

/// Request to an authority endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// HTTP method
    pub method: Method,
    /// Endpoint path relative to the site, or an absolute URL
    pub path: String,
    /// Request headers in insertion order
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<Vec<u8>>,
}

// Bodies and authorization headers carry credentials
impl fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<_> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case("authorization") {
                    (name.as_str(), "[REDACTED]")
                } else {
                    (name.as_str(), value.as_str())
                }
            })
            .collect();
        f.debug_struct("FetchRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &headers)
            .field("body", &self.body.as_ref().map(|b| format!("[{} bytes]", b.len())))
            .finish()
    }
}

impl FetchRequest {
    /// GET request for `path`
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// POST request with a form-urlencoded body
    pub fn post_form<K, V>(path: impl Into<String>, form: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
            .finish();
        Self {
            method: Method::Post,
            path: path.into(),
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Some(body.into_bytes()),
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of a header, case-insensitive
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decoded form body pairs
    pub fn form(&self) -> Vec<(String, String)> {
        self.body
            .as_deref()
            .map(|body| url::form_urlencoded::parse(body).into_owned().collect())
            .unwrap_or_default()
    }
}

/// Response from an authority endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers; names may repeat
    pub headers: Vec<(String, String)>,
    /// Raw body
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Response with a status and body and no headers
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// `200 OK` with a JSON body
    pub fn json(value: &Value) -> Self {
        Self::new(200, value.to_string()).with_header("Content-Type", "application/json")
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of a header, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a header, case-insensitive, in response order
    pub fn headers<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `Content-Type` header value
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether the media type equals `mime`, ignoring parameters and case
    pub fn is_content_type(&self, mime: &str) -> bool {
        self.content_type()
            .and_then(|value| value.split(';').next())
            .is_some_and(|media| media.trim().eq_ignore_ascii_case(mime))
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, lossily decoded
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Reject non-2xx responses that carry no readable OAuth2 error
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Remote`] with the status and body text.
    pub(crate) fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        if self.body.is_empty() {
            return Err(AuthError::Remote(format!("HTTP {}", self.status)));
        }
        if let Ok(json) = serde_json::from_slice::<Value>(&self.body) {
            if let Some(message) = remote_error(&json) {
                return Err(AuthError::Remote(message));
            }
        }
        Err(AuthError::Remote(format!("HTTP {}: {}", self.status, self.text())))
    }
}

/// Message of an OAuth2 `error` member, if the document carries one
///
/// `error` may be an object with a `message`, or a code string. A code is
/// replaced by `error_description` when that is present.
pub(crate) fn remote_error(json: &Value) -> Option<String> {
    match json.get("error")? {
        Value::Object(error) => Some(
            error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string(),
        ),
        Value::String(code) => Some(
            json.get("error_description")
                .and_then(Value::as_str)
                .unwrap_or(code)
                .to_string(),
        ),
        other => Some(other.to_string()),
    }
}

/// Asynchronous HTTP collaborator
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Perform one request
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] only when no response could be obtained.
    async fn fetch(&self, request: FetchRequest) -> std::result::Result<FetchResponse, FetchError>;
}

/// reqwest-backed [`Fetch`]
#[derive(Clone)]
pub struct HttpFetch {
    site: String,
    default_headers: Vec<(String, String)>,
    client: reqwest::Client,
}

impl fmt::Debug for HttpFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetch")
            .field("site", &self.site)
            .field("default_headers", &self.default_headers.len())
            .field("client", &"<reqwest::Client>")
            .finish()
    }
}

impl HttpFetch {
    /// Client for `site` with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        site: impl Into<String>,
        timeout: Duration,
    ) -> std::result::Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            site: site.into(),
            default_headers: Vec::new(),
            client,
        })
    }

    /// Client for the configured site, timeout and extra headers
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the HTTP client cannot be built.
    pub fn from_config(config: &OAuth2ClientConfig) -> std::result::Result<Self, FetchError> {
        let mut fetch = Self::new(config.site.clone(), config.request_timeout)?;
        fetch.default_headers = config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(fetch)
    }

    fn url_for(&self, path: &str) -> std::result::Result<url::Url, FetchError> {
        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.site.trim_end_matches('/'), path)
        };
        url::Url::parse(&raw).map_err(|e| FetchError::InvalidUrl {
            url: raw,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Fetch for HttpFetch {
    async fn fetch(&self, request: FetchRequest) -> std::result::Result<FetchResponse, FetchError> {
        let url = self.url_for(&request.path)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        debug!(method = %method, url = %url, "Fetching from authority");

        let mut builder = self.client.request(method, url);
        for (name, value) in self.default_headers.iter().chain(&request.headers) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();
        trace!(status, bytes = body.len(), "Authority responded");

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}
