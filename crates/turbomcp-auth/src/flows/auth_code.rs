//! Authorization Code grant (RFC 6749 Section 4.1)

use std::borrow::Cow;

use async_trait::async_trait;
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeVerifier, RedirectUrl};
use tracing::debug;

use super::{Flow, TokenEndpoint, grant_error, token_response, wrong_credentials};
use crate::config::OAuth2FlowType;
use crate::error::{AuthError, Result};
use crate::types::{AuthorizeParams, Credentials, TokenResponse};

/// Authorization Code grant with optional PKCE
#[derive(Debug, Clone)]
pub struct AuthorizationCodeFlow {
    endpoint: TokenEndpoint,
}

impl AuthorizationCodeFlow {
    /// Grant posting to `endpoint`
    pub fn new(endpoint: TokenEndpoint) -> Self {
        Self { endpoint }
    }
}

fn redirect_url(uri: &str) -> Result<RedirectUrl> {
    RedirectUrl::new(uri.to_string())
        .map_err(|e| AuthError::InvalidCredentials(format!("invalid redirect URI: {e}")))
}

#[async_trait]
impl Flow for AuthorizationCodeFlow {
    fn flow_type(&self) -> OAuth2FlowType {
        OAuth2FlowType::AuthorizationCode
    }

    /// A missing `state` is replaced by a random one
    fn authorize_url(&self, params: &AuthorizeParams) -> Result<String> {
        let client = self.endpoint.client()?;
        let mut request = client.authorize_url(|| {
            params
                .state
                .clone()
                .map_or_else(CsrfToken::new_random, CsrfToken::new)
        });

        if let Some(uri) = &params.redirect_uri {
            request = request.set_redirect_uri(Cow::Owned(redirect_url(uri)?));
        }
        if let Some(scope) = self.endpoint.scope(&params.scopes) {
            request = request.add_scope(scope);
        }
        if let Some(challenge) = &params.code_challenge {
            let method = params.code_challenge_method.as_deref().unwrap_or("S256");
            request = request
                .add_extra_param("code_challenge", challenge.clone())
                .add_extra_param("code_challenge_method", method.to_string());
        }
        for (name, value) in &params.extra {
            request = request.add_extra_param(name.clone(), value.clone());
        }

        let (url, _state) = request.url();
        Ok(url.to_string())
    }

    async fn get_token(&self, credentials: &Credentials) -> Result<TokenResponse> {
        let Credentials::AuthorizationCode {
            code,
            redirect_uri,
            code_verifier,
        } = credentials
        else {
            return Err(wrong_credentials(self.flow_type(), credentials));
        };

        let client = self.endpoint.client()?;
        let mut request = client.exchange_code(AuthorizationCode::new(code.clone()));
        if let Some(uri) = redirect_uri {
            request = request.set_redirect_uri(Cow::Owned(redirect_url(uri)?));
        }
        if let Some(verifier) = code_verifier {
            request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.clone()));
        }

        debug!(grant_type = self.flow_type().grant_type(), "Requesting token");
        let response = request
            .request_async(self.endpoint.http_client())
            .await
            .map_err(grant_error)?;
        Ok(token_response(&response))
    }
}
