//! Client configuration for an OAuth2 authority
//!
//! Endpoint paths are relative to [`OAuth2ClientConfig::site`] unless they are
//! absolute `http(s)` URLs.

use std::collections::BTreeMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use turbomcp_jose::Jwk;

use crate::error::{AuthError, Result};

/// OAuth2 grant the client uses when no bearer token is presented
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OAuth2FlowType {
    /// Authorization Code grant
    #[default]
    AuthorizationCode,
    /// Client Credentials grant
    ClientCredentials,
    /// Resource Owner Password Credentials grant
    Password,
    /// JWT bearer assertion grant (RFC 7523)
    JwtBearer,
}

impl OAuth2FlowType {
    /// `grant_type` value sent to the token endpoint
    pub fn grant_type(self) -> &'static str {
        match self {
            OAuth2FlowType::AuthorizationCode => "authorization_code",
            OAuth2FlowType::ClientCredentials => "client_credentials",
            OAuth2FlowType::Password => "password",
            OAuth2FlowType::JwtBearer => "urn:ietf:params:oauth:grant-type:jwt-bearer",
        }
    }
}

/// Options for self-signed assertions in the jwt-bearer grant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwtBearerOptions {
    /// Signing algorithm; defaults to the signing key's declared `alg`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    /// `aud` claim; defaults to the token endpoint URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Assertion lifetime in seconds
    #[serde(default = "default_assertion_lifetime")]
    pub expires_in_secs: u64,
}

impl Default for JwtBearerOptions {
    fn default() -> Self {
        Self {
            algorithm: None,
            audience: None,
            expires_in_secs: default_assertion_lifetime(),
        }
    }
}

/// OAuth2 client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2ClientConfig {
    /// Base URL of the authority, e.g. `https://auth.example.com`
    pub site: String,
    /// Authorization endpoint path
    #[serde(default = "default_authorization_path")]
    pub authorization_path: String,
    /// Token endpoint path
    #[serde(default = "default_token_path")]
    pub token_path: String,
    /// Introspection endpoint path (RFC 7662)
    #[serde(default = "default_introspection_path")]
    pub introspection_path: String,
    /// JWK Set endpoint path
    #[serde(default = "default_jwk_path")]
    pub jwk_path: String,
    /// Client identifier
    pub client_id: String,
    /// Client secret for confidential clients
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub client_secret: Option<SecretString>,
    /// Grant used when no bearer token is presented
    #[serde(default)]
    pub flow: OAuth2FlowType,
    /// Separator between scopes in `scope` parameters
    #[serde(default = "default_scope_separator")]
    pub scope_separator: String,
    /// Clock-skew tolerance for `exp`/`nbf`, in seconds
    #[serde(default)]
    pub leeway_secs: u64,
    /// Extra headers sent with every request to the authority
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Per-request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
    /// Verification keys loaded before any JWK Set fetch
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pub_sec_keys: Vec<Jwk>,
    /// jwt-bearer grant options
    #[serde(default)]
    pub jwt_bearer: JwtBearerOptions,
}

fn serialize_secret<S>(
    secret: &Option<SecretString>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_secret<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = serde::Deserialize::deserialize(deserializer)?;
    Ok(s.map(SecretString::new))
}

fn default_authorization_path() -> String {
    "/oauth/authorize".to_string()
}

fn default_token_path() -> String {
    "/oauth/token".to_string()
}

fn default_introspection_path() -> String {
    "/oauth/introspect".to_string()
}

fn default_jwk_path() -> String {
    "/.well-known/jwks.json".to_string()
}

fn default_scope_separator() -> String {
    " ".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_assertion_lifetime() -> u64 {
    300
}

impl OAuth2ClientConfig {
    /// Configuration with default endpoint paths
    pub fn new(site: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            authorization_path: default_authorization_path(),
            token_path: default_token_path(),
            introspection_path: default_introspection_path(),
            jwk_path: default_jwk_path(),
            client_id: client_id.into(),
            client_secret: None,
            flow: OAuth2FlowType::default(),
            scope_separator: default_scope_separator(),
            leeway_secs: 0,
            headers: BTreeMap::new(),
            request_timeout: default_request_timeout(),
            pub_sec_keys: Vec::new(),
            jwt_bearer: JwtBearerOptions::default(),
        }
    }

    /// Set the client secret
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(secret.into()));
        self
    }

    /// Set the grant flow
    pub fn with_flow(mut self, flow: OAuth2FlowType) -> Self {
        self.flow = flow;
        self
    }

    /// Set the clock-skew tolerance
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    /// Preload a verification key
    pub fn with_pub_sec_key(mut self, jwk: Jwk) -> Self {
        self.pub_sec_keys.push(jwk);
        self
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Check that the configuration can be used
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if `site` is not an absolute `http(s)` URL,
    /// the client id is empty, or an endpoint path is empty.
    pub fn validate(&self) -> Result<()> {
        let site = url::Url::parse(&self.site)
            .map_err(|e| AuthError::Config(format!("site `{}`: {e}", self.site)))?;
        if !matches!(site.scheme(), "http" | "https") {
            return Err(AuthError::Config(format!(
                "site must use http or https, got `{}`",
                site.scheme()
            )));
        }
        if self.client_id.is_empty() {
            return Err(AuthError::Config("client_id must not be empty".into()));
        }
        for (name, path) in [
            ("authorization_path", &self.authorization_path),
            ("token_path", &self.token_path),
            ("introspection_path", &self.introspection_path),
            ("jwk_path", &self.jwk_path),
        ] {
            if path.is_empty() {
                return Err(AuthError::Config(format!("{name} must not be empty")));
            }
        }
        if self.scope_separator.is_empty() {
            return Err(AuthError::Config("scope_separator must not be empty".into()));
        }
        Ok(())
    }

    /// Absolute URL for an endpoint path
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.site.trim_end_matches('/'), path)
        }
    }

    /// Join scopes with the configured separator
    pub fn join_scopes<S: AsRef<str>>(&self, scopes: &[S]) -> String {
        scopes
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(&self.scope_separator)
    }
}
