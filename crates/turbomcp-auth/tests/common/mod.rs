//! Common test utilities for integration tests
//!
//! Provides an in-memory [`Fetch`] for driving the provider without a network,
//! a wiremock-backed authority for end-to-end HTTP tests, and key helpers.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use serde_json::{Value, json};
use turbomcp_auth::jose::{Algorithm, Jwk, KeyMaterial, encode};
use turbomcp_auth::{
    Diagnostic, DiagnosticSink, Fetch, FetchError, FetchRequest, FetchResponse,
    OAuth2ClientConfig,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const SITE: &str = "https://auth.example.com";
pub const JWKS_PATH: &str = "/.well-known/jwks.json";
pub const TOKEN_PATH: &str = "/oauth/token";
pub const INTROSPECT_PATH: &str = "/oauth/introspect";

/// Scripted in-memory [`Fetch`]
///
/// Responses are queued per path; the last queued response for a path is
/// repeated once the queue is down to one entry. Absolute URLs on [`SITE`]
/// are routed by their path.
#[derive(Debug, Default)]
pub struct MockFetch {
    routes: Mutex<HashMap<String, VecDeque<Result<FetchResponse, String>>>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockFetch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, response: FetchResponse) {
        self.routes
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(Ok(response));
    }

    pub fn fail(&self, path: &str, message: &str) {
        self.routes
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<FetchRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| route_path(&r.path) == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }
}

#[async_trait]
impl Fetch for MockFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let path = route_path(&request.path).to_string();
        self.requests.lock().push(request);

        let mut routes = self.routes.lock();
        let queue = routes
            .get_mut(&path)
            .ok_or_else(|| FetchError::Other(format!("no route for {path}")))?;
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(FetchError::Other(message)),
            None => Err(FetchError::Other(format!("no response queued for {path}"))),
        }
    }
}

fn route_path(path: &str) -> &str {
    path.strip_prefix(SITE).unwrap_or(path)
}

/// Sink that records every diagnostic
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Diagnostic> {
        self.events.lock().clone()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.events.lock().push(diagnostic);
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Symmetric HS256 JWK as JSON
pub fn oct_json(kid: &str, secret: &[u8]) -> Value {
    json!({
        "kty": "oct",
        "kid": kid,
        "alg": "HS256",
        "k": URL_SAFE_NO_PAD.encode(secret),
    })
}

pub fn oct_jwk(kid: &str, secret: &[u8]) -> Jwk {
    serde_json::from_value(oct_json(kid, secret)).expect("valid JWK")
}

/// Sign `claims` with an HS256 key
pub fn hs256_token(kid: &str, secret: &[u8], claims: &Value) -> String {
    let key = KeyMaterial::from_jwk(&oct_jwk(kid, secret)).expect("valid key");
    encode(&key, Algorithm::HS256, claims).expect("signed token")
}

/// `200` JWK Set response
pub fn jwks_response(keys: &[Value]) -> FetchResponse {
    FetchResponse::json(&json!({ "keys": keys }))
}

pub fn config() -> OAuth2ClientConfig {
    OAuth2ClientConfig::new(SITE, "test-client").with_client_secret("test-secret")
}

/// Decoded form body of a request as a map
pub fn form(request: &FetchRequest) -> HashMap<String, String> {
    request.form().into_iter().collect()
}

/// OAuth2 mock server configuration
pub struct MockOAuth2Server {
    pub server: MockServer,
}

impl MockOAuth2Server {
    /// Create a new mock OAuth2 authorization server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Mock the JWK Set endpoint
    pub async fn mock_jwks(&self, keys: &[Value], cache_control: Option<&str>) {
        let mut response = ResponseTemplate::new(200)
            .set_body_raw(json!({ "keys": keys }).to_string(), "application/jwk-set+json");
        if let Some(value) = cache_control {
            response = response.insert_header("Cache-Control", value);
        }
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Mock successful token endpoint response
    pub async fn mock_token_success(&self, access_token: &str, refresh_token: Option<&str>) {
        let mut response_body = json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "openid profile email",
        });

        if let Some(refresh) = refresh_token {
            response_body["refresh_token"] = json!(refresh);
        }

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&self.server)
            .await;
    }

    /// Mock token endpoint error response
    pub async fn mock_token_error(&self, error: &str, description: &str) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": error,
                "error_description": description,
            })))
            .mount(&self.server)
            .await;
    }

    /// Mock the introspection endpoint
    pub async fn mock_introspection(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path(INTROSPECT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}
