//! Client Credentials grant (RFC 6749 Section 4.4)

use async_trait::async_trait;
use tracing::debug;

use super::{Flow, TokenEndpoint, grant_error, token_response, wrong_credentials};
use crate::config::OAuth2FlowType;
use crate::error::{AuthError, Result};
use crate::types::{Credentials, TokenResponse};

/// Client Credentials grant
///
/// The client authenticates as itself, so a client secret is required.
#[derive(Debug, Clone)]
pub struct ClientCredentialsFlow {
    endpoint: TokenEndpoint,
}

impl ClientCredentialsFlow {
    /// Grant posting to `endpoint`
    pub fn new(endpoint: TokenEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Flow for ClientCredentialsFlow {
    fn flow_type(&self) -> OAuth2FlowType {
        OAuth2FlowType::ClientCredentials
    }

    async fn get_token(&self, credentials: &Credentials) -> Result<TokenResponse> {
        let Credentials::ClientCredentials { scopes } = credentials else {
            return Err(wrong_credentials(self.flow_type(), credentials));
        };
        if self.endpoint.config().client_secret.is_none() {
            return Err(AuthError::Config(
                "client_credentials requires a client secret".into(),
            ));
        }

        let client = self.endpoint.client()?;
        let mut request = client.exchange_client_credentials();
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
