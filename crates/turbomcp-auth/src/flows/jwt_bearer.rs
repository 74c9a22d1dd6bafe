//! JWT bearer assertion grant (RFC 7523 Section 2.1)

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use turbomcp_jose::{KeyMaterial, crypto::parse_algorithm, encode};

use super::{Flow, TokenEndpoint, wrong_credentials};
use crate::config::OAuth2FlowType;
use crate::error::{AuthError, Result};
use crate::types::{Credentials, TokenResponse};

/// JWT bearer grant
///
/// Callers may bring their own assertion. Otherwise one is signed with the
/// client's key: `iss` is the client id, `sub` defaults to it, `aud` defaults
/// to the token endpoint URL.
#[derive(Debug, Clone)]
pub struct JwtBearerFlow {
    endpoint: TokenEndpoint,
    signing_key: Option<Arc<KeyMaterial>>,
}

impl JwtBearerFlow {
    /// Grant posting to `endpoint`, signing assertions with `signing_key`
    pub fn new(endpoint: TokenEndpoint, signing_key: Option<Arc<KeyMaterial>>) -> Self {
        Self {
            endpoint,
            signing_key,
        }
    }

    /// Sign an assertion for `subject`
    ///
    /// # Errors
    ///
    /// - [`AuthError::Config`] without a signing key, or when no algorithm is
    ///   configured and the key declares none
    /// - [`AuthError::Jose`] if the key cannot sign with the algorithm
    pub fn assertion(&self, subject: Option<&str>) -> Result<String> {
        let key = self.signing_key.as_deref().ok_or_else(|| {
            AuthError::Config(
                "jwt-bearer grant needs a signing key or an explicit assertion".into(),
            )
        })?;
        let config = self.endpoint.config();
        let options = &config.jwt_bearer;

        let alg = match &options.algorithm {
            Some(name) => parse_algorithm(name)
                .ok_or_else(|| AuthError::Config(format!("unknown assertion algorithm `{name}`")))?,
            None => key.algorithm().ok_or_else(|| {
                AuthError::Config("signing key declares no `alg`; set jwt_bearer.algorithm".into())
            })?,
        };

        let now = chrono::Utc::now().timestamp();
        let lifetime = i64::try_from(options.expires_in_secs).unwrap_or(i64::MAX);
        let claims = json!({
            "iss": config.client_id,
            "sub": subject.unwrap_or(&config.client_id),
            "aud": options
                .audience
                .clone()
                .unwrap_or_else(|| config.resolve(&config.token_path)),
            "iat": now,
            "exp": now.saturating_add(lifetime),
            "jti": uuid::Uuid::new_v4().to_string(),
        });
        Ok(encode(key, alg, &claims)?)
    }
}

#[async_trait]
impl Flow for JwtBearerFlow {
    fn flow_type(&self) -> OAuth2FlowType {
        OAuth2FlowType::JwtBearer
    }

    async fn get_token(&self, credentials: &Credentials) -> Result<TokenResponse> {
        let Credentials::JwtBearer {
            assertion,
            subject,
            scopes,
        } = credentials
        else {
            return Err(wrong_credentials(self.flow_type(), credentials));
        };

        let assertion = match assertion {
            Some(assertion) => assertion.clone(),
            None => self.assertion(subject.as_deref())?,
        };
        let mut form = vec![
            ("grant_type", self.flow_type().grant_type().to_string()),
            ("assertion", assertion),
        ];
        if !scopes.is_empty() {
            form.push(("scope", self.endpoint.config().join_scopes(scopes)));
        }
        self.endpoint.request(form).await
    }
}
