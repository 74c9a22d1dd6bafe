//! OAuth2 grant flows
//!
//! A [`Flow`] turns non-bearer [`Credentials`] into a token endpoint response.
//! The authorization code, client credentials and password grants are driven
//! by the `oauth2` crate over [`OAuth2HttpClient`]. The jwt-bearer grant has
//! no `oauth2` request type and posts its form through [`Fetch`] directly.
//! All of them share [`TokenEndpoint`].

mod auth_code;
mod client_credentials;
mod http_client;
mod jwt_bearer;
mod password;

use std::sync::Arc;

use async_trait::async_trait;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthType, AuthUrl, Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
    ExtraTokenFields, RequestTokenError, Scope, StandardRevocableToken, StandardTokenResponse,
    TokenResponse as _, TokenUrl,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use turbomcp_jose::KeyMaterial;

pub use auth_code::AuthorizationCodeFlow;
pub use client_credentials::ClientCredentialsFlow;
pub use http_client::OAuth2HttpClient;
pub use jwt_bearer::JwtBearerFlow;
pub use password::PasswordFlow;

use crate::config::{OAuth2ClientConfig, OAuth2FlowType};
use crate::error::{AuthError, FetchError, Result};
use crate::fetch::{Fetch, FetchRequest, FetchResponse, remote_error};
use crate::types::{AuthorizeParams, Credentials, TokenResponse};

/// An OAuth2 grant
#[async_trait]
pub trait Flow: Send + Sync {
    /// The grant this flow implements
    fn flow_type(&self) -> OAuth2FlowType;

    /// URL the user agent is sent to in order to authorize the client
    ///
    /// # Errors
    ///
    /// Only the authorization code grant has an authorization URL; every other
    /// flow returns [`AuthError::Config`].
    fn authorize_url(&self, params: &AuthorizeParams) -> Result<String> {
        let _ = params;
        Err(AuthError::Config(format!(
            "the {} flow has no authorization URL",
            self.flow_type().grant_type()
        )))
    }

    /// Exchange `credentials` at the token endpoint
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] if the credentials do not fit the grant
    /// - [`AuthError::Remote`] if the authority rejects the request
    /// - transport and response-format errors from the token endpoint call
    async fn get_token(&self, credentials: &Credentials) -> Result<TokenResponse>;
}

/// Flow for the configured grant
pub fn for_config(
    config: Arc<OAuth2ClientConfig>,
    fetch: Arc<dyn Fetch>,
    signing_key: Option<Arc<KeyMaterial>>,
) -> Arc<dyn Flow> {
    let endpoint = TokenEndpoint::new(Arc::clone(&config), fetch);
    match config.flow {
        OAuth2FlowType::AuthorizationCode => Arc::new(AuthorizationCodeFlow::new(endpoint)),
        OAuth2FlowType::ClientCredentials => Arc::new(ClientCredentialsFlow::new(endpoint)),
        OAuth2FlowType::Password => Arc::new(PasswordFlow::new(endpoint)),
        OAuth2FlowType::JwtBearer => Arc::new(JwtBearerFlow::new(endpoint, signing_key)),
    }
}

/// Token response members beyond RFC 6749 Section 5.1
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct GrantExtraFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
    #[serde(flatten)]
    additional: Map<String, Value>,
}

impl ExtraTokenFields for GrantExtraFields {}

pub(crate) type GrantTokenResponse = StandardTokenResponse<GrantExtraFields, BasicTokenType>;

/// `oauth2` client with the authorization and token endpoints set
pub(crate) type GrantClient = Client<
    BasicErrorResponse,
    GrantTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Token endpoint of the configured authority
#[derive(Clone)]
pub struct TokenEndpoint {
    config: Arc<OAuth2ClientConfig>,
    fetch: Arc<dyn Fetch>,
    http: OAuth2HttpClient,
}

impl std::fmt::Debug for TokenEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEndpoint")
            .field("token_path", &self.config.token_path)
            .finish()
    }
}

impl TokenEndpoint {
    /// Endpoint described by `config`, reached through `fetch`
    pub fn new(config: Arc<OAuth2ClientConfig>, fetch: Arc<dyn Fetch>) -> Self {
        let http = OAuth2HttpClient::new(Arc::clone(&fetch));
        Self {
            config,
            fetch,
            http,
        }
    }

    /// Client configuration the endpoint was built from
    pub fn config(&self) -> &OAuth2ClientConfig {
        &self.config
    }

    pub(crate) fn http_client(&self) -> &OAuth2HttpClient {
        &self.http
    }

    /// `oauth2` client for the configured authority
    ///
    /// Confidential clients authenticate with HTTP Basic; public clients send
    /// `client_id` in the form.
    pub(crate) fn client(&self) -> Result<GrantClient> {
        let config = &self.config;
        let auth_url = AuthUrl::new(config.resolve(&config.authorization_path))
            .map_err(|e| AuthError::Config(format!("invalid authorization URL: {e}")))?;
        let token_url = TokenUrl::new(config.resolve(&config.token_path))
            .map_err(|e| AuthError::Config(format!("invalid token URL: {e}")))?;

        let client = Client::new(ClientId::new(config.client_id.clone()))
            .set_auth_type(AuthType::BasicAuth)
            .set_auth_uri(auth_url)
            .set_token_uri(token_url);
        Ok(match &config.client_secret {
            Some(secret) => {
                client.set_client_secret(ClientSecret::new(secret.expose_secret().clone()))
            }
            None => client,
        })
    }

    /// Single `scope` value joined with the configured separator
    ///
    /// `oauth2` joins scopes with spaces, so they are handed over pre-joined.
    pub(crate) fn scope(&self, scopes: &[String]) -> Option<Scope> {
        (!scopes.is_empty()).then(|| Scope::new(self.config.join_scopes(scopes)))
    }

    /// Post an extension grant `form` to the token endpoint
    ///
    /// The client authenticates with `client_id` (and `client_secret` when it
    /// has one) in the form body.
    ///
    /// # Errors
    ///
    /// See [`Flow::get_token`].
    pub async fn request(&self, mut form: Vec<(&str, String)>) -> Result<TokenResponse> {
        form.push(("client_id", self.config.client_id.clone()));
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.expose_secret().clone()));
        }
        let request = FetchRequest::post_form(self.config.token_path.clone(), &form)
            .header("Accept", "application/json,application/x-www-form-urlencoded;q=0.9");

        let grant = form
            .iter()
            .find(|(k, _)| *k == "grant_type")
            .map(|(_, v)| v.as_str())
            .unwrap_or_default();
        debug!(grant_type = grant, "Requesting token");

        let response = self.fetch.fetch(request).await?;
        parse_token_response(&response)
    }
}

/// Our view of an `oauth2` token response
pub(crate) fn token_response(response: &GrantTokenResponse) -> TokenResponse {
    let extra = response.extra_fields();
    TokenResponse {
        access_token: Some(response.access_token().secret().clone()),
        token_type: Some(response.token_type().as_ref().to_string()),
        refresh_token: response.refresh_token().map(|t| t.secret().clone()),
        id_token: extra.id_token.clone(),
        scope: response.scopes().map(|scopes| {
            scopes
                .iter()
                .map(|scope| scope.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        }),
        expires_in: response
            .expires_in()
            .map(|lifetime| i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX)),
        additional: extra.additional.clone(),
    }
}

/// Map an `oauth2` request failure onto [`AuthError`]
pub(crate) fn grant_error(err: RequestTokenError<FetchError, BasicErrorResponse>) -> AuthError {
    match err {
        RequestTokenError::ServerResponse(response) => AuthError::Remote(
            response
                .error_description()
                .cloned()
                .unwrap_or_else(|| response.error().to_string()),
        ),
        RequestTokenError::Request(err) => AuthError::Fetch(err),
        RequestTokenError::Parse(_, body) if body.is_empty() => AuthError::EmptyResponse,
        RequestTokenError::Parse(err, body) => serde_json::from_slice::<Value>(&body)
            .ok()
            .and_then(|json| remote_error(&json))
            .map_or_else(
                || AuthError::InvalidResponse(format!("token response: {err}")),
                AuthError::Remote,
            ),
        RequestTokenError::Other(message) => AuthError::InvalidResponse(message),
    }
}

/// Read an extension grant response; JSON and form-urlencoded bodies are accepted
pub(crate) fn parse_token_response(response: &FetchResponse) -> Result<TokenResponse> {
    if response.body.is_empty() {
        if response.is_success() {
            return Err(AuthError::EmptyResponse);
        }
        return Err(AuthError::Remote(format!("HTTP {}", response.status)));
    }

    let json = if response.is_content_type("application/json") {
        serde_json::from_slice::<Value>(&response.body)
            .map_err(|e| AuthError::InvalidResponse(format!("token response: {e}")))?
    } else if response.is_content_type("application/x-www-form-urlencoded")
        || response.is_content_type("text/plain")
    {
        let map: Map<String, Value> = url::form_urlencoded::parse(&response.body)
            .into_owned()
            .map(|(k, v)| {
                let value = match k.as_str() {
                    "expires_in" => v.parse::<i64>().map_or(Value::String(v), Value::from),
                    _ => Value::String(v),
                };
                (k, value)
            })
            .collect();
        Value::Object(map)
    } else {
        return Err(AuthError::UnacceptableContentType(
            response.content_type().unwrap_or_default().to_string(),
        ));
    };

    if let Some(message) = remote_error(&json) {
        return Err(AuthError::Remote(message));
    }
    if !response.is_success() {
        return Err(AuthError::Remote(format!(
            "HTTP {}: {}",
            response.status,
            response.text()
        )));
    }
    serde_json::from_value(json)
        .map_err(|e| AuthError::InvalidResponse(format!("token response: {e}")))
}

pub(crate) fn wrong_credentials(flow: OAuth2FlowType, credentials: &Credentials) -> AuthError {
    AuthError::InvalidCredentials(format!(
        "{} credentials cannot be used with the {} flow",
        credentials.kind(),
        flow.grant_type()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use oauth2::basic::BasicErrorResponseType;
    use serde_json::json;

    fn grant_response(body: Value) -> GrantTokenResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_grant_response_keeps_id_token_and_extras() {
        let token = token_response(&grant_response(json!({
            "access_token": "at",
            "token_type": "Bearer",
            "expires_in": 60,
            "refresh_token": "rt",
            "id_token": "idt",
            "scope": "openid profile",
            "tenant": "acme"
        })));

        assert_eq!(token.access_token.as_deref(), Some("at"));
        assert_eq!(token.token_type.as_deref(), Some("bearer"));
        assert_eq!(token.expires_in, Some(60));
        assert_eq!(token.refresh_token.as_deref(), Some("rt"));
        assert_eq!(token.id_token.as_deref(), Some("idt"));
        assert_eq!(token.scope.as_deref(), Some("openid profile"));
        assert_eq!(token.additional.get("tenant"), Some(&json!("acme")));
        assert!(!token.additional.contains_key("id_token"));
    }

    #[test]
    fn test_grant_errors() {
        let server = BasicErrorResponse::new(
            BasicErrorResponseType::InvalidGrant,
            Some("code expired".into()),
            None,
        );
        assert!(matches!(
            grant_error(RequestTokenError::ServerResponse(server)),
            AuthError::Remote(msg) if msg == "code expired"
        ));

        let bare = BasicErrorResponse::new(BasicErrorResponseType::InvalidClient, None, None);
        assert!(matches!(
            grant_error(RequestTokenError::ServerResponse(bare)),
            AuthError::Remote(msg) if msg == "invalid_client"
        ));

        let transport = RequestTokenError::Request(FetchError::Other("down".into()));
        assert!(grant_error(transport).is_transient());
    }

    #[test]
    fn test_json_token_response() {
        let response = FetchResponse::json(&json!({
            "access_token": "at", "token_type": "Bearer", "expires_in": 60
        }));
        let token = parse_token_response(&response).unwrap();
        assert_eq!(token.access_token.as_deref(), Some("at"));
        assert_eq!(token.expires_in, Some(60));
    }

    #[test]
    fn test_form_token_response() {
        let body = "access_token=at&token_type=bearer&expires_in=120&scope=a+b";
        let response = FetchResponse::new(200, body)
            .with_header("Content-Type", "application/x-www-form-urlencoded");
        let token = parse_token_response(&response).unwrap();
        assert_eq!(token.access_token.as_deref(), Some("at"));
        assert_eq!(token.expires_in, Some(120));
        assert_eq!(token.scope.as_deref(), Some("a b"));
    }

    #[test]
    fn test_error_responses() {
        let body = r#"{"error":"invalid_grant","error_description":"code expired"}"#;
        let response =
            FetchResponse::new(400, body).with_header("Content-Type", "application/json");
        assert!(matches!(
            parse_token_response(&response),
            Err(AuthError::Remote(msg)) if msg == "code expired"
        ));

        let response = FetchResponse::new(200, "<html/>").with_header("Content-Type", "text/html");
        assert!(matches!(
            parse_token_response(&response),
            Err(AuthError::UnacceptableContentType(ct)) if ct == "text/html"
        ));

        let response = FetchResponse::new(200, "").with_header("Content-Type", "application/json");
        assert!(matches!(parse_token_response(&response), Err(AuthError::EmptyResponse)));

        let response = FetchResponse::new(500, r#"{"detail":"oops"}"#)
            .with_header("Content-Type", "application/json");
        assert!(matches!(parse_token_response(&response), Err(AuthError::Remote(_))));
    }
}
