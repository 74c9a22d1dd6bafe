//! Resource Owner Password Credentials grant (RFC 6749 Section 4.3)

use async_trait::async_trait;
use oauth2::{ResourceOwnerPassword, ResourceOwnerUsername};
use secrecy::ExposeSecret;
use tracing::debug;

use super::{Flow, TokenEndpoint, grant_error, token_response, wrong_credentials};
use crate::config::OAuth2FlowType;
use crate::error::Result;
use crate::types::{Credentials, TokenResponse};

/// Password grant
#[derive(Debug, Clone)]
pub struct PasswordFlow {
    endpoint: TokenEndpoint,
}

impl PasswordFlow {
    /// Grant posting to `endpoint`
    pub fn new(endpoint: TokenEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Flow for PasswordFlow {
    fn flow_type(&self) -> OAuth2FlowType {
        OAuth2FlowType::Password
    }

    async fn get_token(&self, credentials: &Credentials) -> Result<TokenResponse> {
        let Credentials::Password {
            username,
            password,
            scopes,
        } = credentials
        else {
            return Err(wrong_credentials(self.flow_type(), credentials));
        };

        let username = ResourceOwnerUsername::new(username.clone());
        let password = ResourceOwnerPassword::new(password.expose_secret().clone());
        let client = self.endpoint.client()?;
        let mut request = client.exchange_password(&username, &password);
        if let Some(scope) = self.endpoint.scope(scopes) {
            request = request.add_scope(scope);
        }

        debug!(grant_type = self.flow_type().grant_type(), "Requesting token");
        let response = request
            .request_async(self.endpoint.http_client())
            .await
            .map_err(grant_error)?;
        Ok(token_response(&response))
    }
}
