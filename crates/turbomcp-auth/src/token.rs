//! Authenticated token session

use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;
use turbomcp_jose::KeyStore;
use turbomcp_jose::token::numeric_date;

use crate::error::{AuthError, Result};
use crate::introspection::IntrospectionResponse;
use crate::types::TokenResponse;

/// Result of a successful authentication
///
/// Wraps the token endpoint response (or the presented bearer token) together
/// with whatever could be learned about it: claims of a locally verified JWT,
/// the introspection response, and the resulting validity window.
#[derive(Clone)]
pub struct AccessToken {
    response: TokenResponse,
    access_claims: Option<Map<String, Value>>,
    id_claims: Option<Map<String, Value>>,
    introspection: Option<IntrospectionResponse>,
    expires_at: Option<i64>,
    not_before: Option<i64>,
    leeway: u64,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("response", &self.response)
            .field("decoded", &self.access_claims.is_some())
            .field("introspected", &self.introspection.is_some())
            .field("expires_at", &self.expires_at)
            .field("not_before", &self.not_before)
            .finish()
    }
}

/// Verify `token` against `store`; signature only, temporal claims are read later
fn decode(
    store: &KeyStore,
    token: Option<&str>,
    which: &'static str,
) -> Option<Map<String, Value>> {
    let token = token.filter(|t| !t.is_empty())?;
    if store.is_unsecure() {
        return None;
    }
    match store.verify_signature(token) {
        Ok(decoded) => Some(decoded.into_claims()),
        Err(err) => {
            debug!(token = which, error = %err, "Token not verifiable with current keys");
            None
        }
    }
}

impl AccessToken {
    /// Build a session, decoding the access and id tokens with `store`
    ///
    /// `exp`/`nbf` come from the verified access token when present; otherwise
    /// `expires_in` is counted from now.
    pub fn new(response: TokenResponse, store: &KeyStore) -> Self {
        let access_claims = decode(store, response.access_token.as_deref(), "access_token");
        let id_claims = decode(store, response.id_token.as_deref(), "id_token");

        let claim = |name| {
            access_claims
                .as_ref()
                .and_then(|claims| numeric_date(claims, name).ok().flatten())
        };
        let expires_at = claim("exp").or_else(|| {
            response
                .expires_in
                .map(|secs| chrono::Utc::now().timestamp().saturating_add(secs))
        });
        let not_before = claim("nbf");

        Self {
            response,
            access_claims,
            id_claims,
            introspection: None,
            expires_at,
            not_before,
            leeway: store.leeway(),
        }
    }

    /// Whether the access token was verified against the key store
    pub fn is_decoded(&self) -> bool {
        self.access_claims.is_some()
    }

    /// Whether the token is outside its validity window now
    pub fn expired(&self) -> bool {
        self.expired_at(chrono::Utc::now().timestamp())
    }

    /// Whether the token is outside its validity window at `now` (unix seconds)
    ///
    /// A token without `exp` never expires.
    pub fn expired_at(&self, now: i64) -> bool {
        let leeway = i64::try_from(self.leeway).unwrap_or(i64::MAX);
        self.expires_at
            .is_some_and(|exp| exp.saturating_add(leeway) <= now)
            || self
                .not_before
                .is_some_and(|nbf| nbf.saturating_sub(leeway) > now)
    }

    /// Merge an introspection result into the session
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InactiveToken`] if the authority reports the token
    /// as not active.
    pub(crate) fn apply_introspection(
        &mut self,
        introspection: IntrospectionResponse,
    ) -> Result<()> {
        if !introspection.active {
            return Err(AuthError::InactiveToken);
        }
        if let Some(exp) = introspection.exp {
            self.expires_at = Some(exp);
        }
        if let Some(nbf) = introspection.nbf {
            self.not_before = Some(nbf);
        }
        self.introspection = Some(introspection);
        Ok(())
    }

    /// The token endpoint response, or the presented bearer token
    pub fn response(&self) -> &TokenResponse {
        &self.response
    }

    /// Access token string
    pub fn access_token(&self) -> Option<&str> {
        self.response.access_token.as_deref()
    }

    /// Refresh token, if one was issued
    pub fn refresh_token(&self) -> Option<&str> {
        self.response.refresh_token.as_deref()
    }

    /// OpenID Connect id token, if one was issued
    pub fn id_token(&self) -> Option<&str> {
        self.response.id_token.as_deref()
    }

    /// Token type, e.g. `bearer`
    pub fn token_type(&self) -> Option<&str> {
        self.response.token_type.as_deref()
    }

    /// Claims of the verified access token
    pub fn access_token_claims(&self) -> Option<&Map<String, Value>> {
        self.access_claims.as_ref()
    }

    /// Claims of the verified id token
    pub fn id_token_claims(&self) -> Option<&Map<String, Value>> {
        self.id_claims.as_ref()
    }

    /// Introspection response, if the token was introspected
    pub fn introspection(&self) -> Option<&IntrospectionResponse> {
        self.introspection.as_ref()
    }

    /// Expiry as unix seconds
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    /// Subject from the verified token or the introspection response
    pub fn subject(&self) -> Option<&str> {
        self.access_claims
            .as_ref()
            .and_then(|claims| claims.get("sub"))
            .and_then(Value::as_str)
            .or_else(|| self.introspection.as_ref()?.sub.as_deref())
    }

    /// JSON view of the session
    ///
    /// The token response fields plus `access_token_claims`, `id_token_claims`
    /// and `expires_at` when known.
    pub fn principal(&self) -> Value {
        let mut principal = match serde_json::to_value(&self.response) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        if let Some(claims) = &self.access_claims {
            principal.insert("access_token_claims".into(), Value::Object(claims.clone()));
        }
        if let Some(claims) = &self.id_claims {
            principal.insert("id_token_claims".into(), Value::Object(claims.clone()));
        }
        if let Some(exp) = self.expires_at {
            principal.insert("expires_at".into(), exp.into());
        }
        Value::Object(principal)
    }

    /// Granted scopes
    ///
    /// Looked up in the token response, then the introspection response, then
    /// the access token's `scope` claim.
    pub fn scopes<'a>(&'a self, separator: &'a str) -> Vec<&'a str> {
        let scope = self
            .response
            .scope
            .as_deref()
            .or_else(|| self.introspection.as_ref()?.scope.as_deref())
            .or_else(|| self.access_claims.as_ref()?.get("scope")?.as_str());
        scope
            .map(|s| s.split(separator).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }
}
