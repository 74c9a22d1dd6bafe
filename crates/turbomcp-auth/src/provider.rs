//! Authentication orchestrator
//!
//! [`OAuth2Provider`] decides how a credential is authenticated:
//!
//! 1. A non-empty bearer token is verified locally when the key store holds a
//!    key that verifies it. Expired tokens fail with [`AuthError::ExpiredToken`].
//! 2. Otherwise (no keys loaded, opaque token, unknown key, bad signature) the
//!    token is introspected and its expiry rechecked afterwards.
//! 3. Any other credential goes to the configured grant [`Flow`].

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};
use turbomcp_jose::{KeyMaterial, KeyStore, peek_header};

use crate::config::{OAuth2ClientConfig, OAuth2FlowType};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::{AuthError, Result};
use crate::fetch::{Fetch, HttpFetch};
use crate::flows::{self, Flow};
use crate::introspection::{IntrospectionClient, Introspector};
use crate::refresh::{KeyRefreshCoordinator, RefreshOutcome};
use crate::token::AccessToken;
use crate::types::{AuthorizeParams, BearerToken, Credentials, TokenResponse};

/// Callback invoked with the `kid` of a token no loaded key matches
pub type MissingKeyHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// OAuth2 authentication provider
///
/// # Example
///
/// ```rust,no_run
/// use turbomcp_auth::{Credentials, OAuth2ClientConfig, OAuth2Provider};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = OAuth2ClientConfig::new("https://auth.example.com", "my-client");
/// let provider = OAuth2Provider::builder(config).build()?;
///
/// provider.load_keys().await?;
/// let token = provider.authenticate(Credentials::bearer("eyJ...")).await?;
/// println!("subject: {:?}", token.subject());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct OAuth2Provider {
    config: Arc<OAuth2ClientConfig>,
    keys: KeyRefreshCoordinator,
    flow: Arc<dyn Flow>,
    introspector: Arc<dyn Introspector>,
    missing_key_handler: Option<MissingKeyHandler>,
}

impl fmt::Debug for OAuth2Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Provider")
            .field("site", &self.config.site)
            .field("client_id", &self.config.client_id)
            .field("flow", &self.flow.flow_type())
            .field("keys", &self.keys)
            .field("missing_key_handler", &self.missing_key_handler.is_some())
            .finish()
    }
}

impl OAuth2Provider {
    /// Start building a provider for `config`
    pub fn builder(config: OAuth2ClientConfig) -> OAuth2ProviderBuilder {
        OAuth2ProviderBuilder::new(config)
    }

    /// Configuration the provider was built from
    pub fn config(&self) -> &OAuth2ClientConfig {
        &self.config
    }

    /// The configured grant
    pub fn flow_type(&self) -> OAuth2FlowType {
        self.flow.flow_type()
    }

    /// Key store and refresh schedule
    pub fn keys(&self) -> &KeyRefreshCoordinator {
        &self.keys
    }

    /// Whether no verification key is loaded
    pub fn is_unsecure(&self) -> bool {
        self.keys.is_unsecure()
    }

    /// Authenticate a credential
    ///
    /// # Errors
    ///
    /// - [`AuthError::ExpiredToken`] for a bearer token past its expiry
    /// - [`AuthError::InactiveToken`] if introspection reports the token inactive
    /// - any error of [`Introspector::introspect`] or [`Flow::get_token`]
    #[instrument(skip_all, fields(credentials = credentials.kind()))]
    pub async fn authenticate(&self, credentials: Credentials) -> Result<AccessToken> {
        match credentials {
            Credentials::Bearer(bearer) if !bearer.access_token.is_empty() => {
                self.validate_bearer(bearer).await
            }
            other => {
                let response = self.flow.get_token(&other).await?;
                let token = AccessToken::new(response, &self.keys.store());
                debug!(decoded = token.is_decoded(), "Token obtained from flow");
                Ok(token)
            }
        }
    }

    async fn validate_bearer(&self, bearer: BearerToken) -> Result<AccessToken> {
        let store = self.keys.store();
        let raw = bearer.access_token.clone();
        self.notify_missing_key(&store, &raw);

        let mut token = AccessToken::new(bearer.into(), &store);
        if token.is_decoded() {
            if token.expired() {
                return Err(AuthError::ExpiredToken);
            }
            debug!("Bearer token verified locally");
            return Ok(token);
        }

        debug!(unsecure = store.is_unsecure(), "Falling back to token introspection");
        let response = self.introspector.introspect(&raw, Some("access_token")).await?;
        token.apply_introspection(response)?;
        if token.expired() {
            return Err(AuthError::ExpiredToken);
        }
        Ok(token)
    }

    fn notify_missing_key(&self, store: &KeyStore, token: &str) {
        let Some(handler) = &self.missing_key_handler else {
            return;
        };
        if let Ok(header) = peek_header(token) {
            if let Some(kid) = header.kid.as_deref() {
                if !store.contains_kid(kid) {
                    debug!(kid, "Token references a key that is not loaded");
                    handler(kid);
                }
            }
        }
    }

    /// Fetch the JWK Set and replace the key store
    ///
    /// # Errors
    ///
    /// See [`KeyRefreshCoordinator::refresh`].
    pub async fn load_keys(&self) -> Result<RefreshOutcome> {
        self.keys.refresh().await
    }

    /// Authorization URL for the authorization code grant
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] for every other grant.
    pub fn authorize_url(&self, params: &AuthorizeParams) -> Result<String> {
        self.flow.authorize_url(params)
    }

    /// Introspect a token the caller already holds
    ///
    /// `token_type` is `access_token` or `refresh_token`. Expiry known from
    /// local decoding is checked before any request is made, and again after
    /// the introspection result is applied.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ExpiredToken`] before or after introspection
    /// - [`AuthError::InactiveToken`] if the authority reports it inactive
    /// - [`AuthError::InvalidCredentials`] for an unknown `token_type`
    ///
    /// # Example
    ///
    /// ```rust
    /// use turbomcp_auth::{AuthError, OAuth2ClientConfig, OAuth2Provider};
    ///
    /// # tokio_test::block_on(async {
    /// let config = OAuth2ClientConfig::new("https://auth.example.com", "my-client");
    /// let provider = OAuth2Provider::builder(config).build().unwrap();
    ///
    /// let err = provider.introspect_token("opaque", "id_token").await.unwrap_err();
    /// assert!(matches!(err, AuthError::InvalidCredentials(_)));
    /// # });
    /// ```
    #[instrument(skip(self, token))]
    pub async fn introspect_token(&self, token: &str, token_type: &str) -> Result<AccessToken> {
        let response = match token_type {
            "access_token" => TokenResponse {
                access_token: Some(token.to_string()),
                ..Default::default()
            },
            "refresh_token" => TokenResponse {
                refresh_token: Some(token.to_string()),
                ..Default::default()
            },
            other => {
                return Err(AuthError::InvalidCredentials(format!(
                    "unknown token type `{other}`"
                )));
            }
        };

        let mut session = AccessToken::new(response, &self.keys.store());
        if session.expired() {
            return Err(AuthError::ExpiredToken);
        }
        let introspection = self.introspector.introspect(token, Some(token_type)).await?;
        session.apply_introspection(introspection)?;
        if session.expired() {
            return Err(AuthError::ExpiredToken);
        }
        Ok(session)
    }

    /// Authenticate a bearer token string
    ///
    /// # Errors
    ///
    /// See [`OAuth2Provider::authenticate`].
    pub async fn decode_token(&self, token: &str) -> Result<AccessToken> {
        self.authenticate(Credentials::bearer(token)).await
    }

    /// Ensure the provider uses the password grant
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] for any other grant.
    pub fn verify_is_using_password(&self) -> Result<()> {
        match self.flow_type() {
            OAuth2FlowType::Password => Ok(()),
            other => Err(AuthError::Config(format!(
                "provider is configured for {}, not password",
                other.grant_type()
            ))),
        }
    }
}

/// Builder for [`OAuth2Provider`]
///
/// Collaborators default to the HTTP implementations derived from the
/// configuration.
pub struct OAuth2ProviderBuilder {
    config: OAuth2ClientConfig,
    fetch: Option<Arc<dyn Fetch>>,
    flow: Option<Arc<dyn Flow>>,
    introspector: Option<Arc<dyn Introspector>>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
    signing_key: Option<Arc<KeyMaterial>>,
    missing_key_handler: Option<MissingKeyHandler>,
}

impl fmt::Debug for OAuth2ProviderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2ProviderBuilder")
            .field("config", &self.config)
            .field("custom_fetch", &self.fetch.is_some())
            .field("custom_flow", &self.flow.is_some())
            .field("custom_introspector", &self.introspector.is_some())
            .field("signing_key", &self.signing_key)
            .finish()
    }
}

impl OAuth2ProviderBuilder {
    fn new(config: OAuth2ClientConfig) -> Self {
        Self {
            config,
            fetch: None,
            flow: None,
            introspector: None,
            diagnostics: None,
            signing_key: None,
            missing_key_handler: None,
        }
    }

    /// HTTP collaborator for every authority call
    pub fn fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Replace the grant flow selected from the configuration
    pub fn flow(mut self, flow: Arc<dyn Flow>) -> Self {
        self.flow = Some(flow);
        self
    }

    /// Replace the endpoint-backed introspector
    pub fn introspector(mut self, introspector: Arc<dyn Introspector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    /// Receiver for skipped keys and failed automatic refreshes
    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Key used to sign jwt-bearer assertions
    pub fn signing_key(mut self, key: KeyMaterial) -> Self {
        self.signing_key = Some(Arc::new(key));
        self
    }

    /// Called with the `kid` of bearer tokens that no loaded key matches
    pub fn missing_key_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.missing_key_handler = Some(Arc::new(handler));
        self
    }

    /// Build the provider
    ///
    /// Keys in `pub_sec_keys` are loaded into the initial store; no request
    /// is made until [`OAuth2Provider::load_keys`] or
    /// [`OAuth2Provider::authenticate`] needs one.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Config`] if the configuration does not validate
    /// - [`AuthError::Jose`] if a preloaded key is invalid
    /// - [`AuthError::Fetch`] if the default HTTP client cannot be built
    pub fn build(self) -> Result<OAuth2Provider> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let mut store = KeyStore::new().with_leeway(config.leeway_secs);
        for jwk in &config.pub_sec_keys {
            store.add_jwk(jwk)?;
        }

        let fetch: Arc<dyn Fetch> = match self.fetch {
            Some(fetch) => fetch,
            None => Arc::new(HttpFetch::from_config(&config)?),
        };
        let diagnostics = self
            .diagnostics
            .unwrap_or_else(|| Arc::new(TracingSink));
        let keys = KeyRefreshCoordinator::new(
            Arc::clone(&fetch),
            config.jwk_path.clone(),
            store,
            diagnostics,
        );
        let flow = self.flow.unwrap_or_else(|| {
            flows::for_config(Arc::clone(&config), Arc::clone(&fetch), self.signing_key)
        });
        let introspector = self.introspector.unwrap_or_else(|| {
            Arc::new(IntrospectionClient::new(
                fetch,
                config.introspection_path.clone(),
                config.client_id.clone(),
                config.client_secret.clone(),
            ))
        });

        debug!(
            site = %config.site,
            flow = ?flow.flow_type(),
            preloaded_keys = config.pub_sec_keys.len(),
            "OAuth2 provider ready"
        );

        Ok(OAuth2Provider {
            config,
            keys,
            flow,
            introspector,
            missing_key_handler: self.missing_key_handler,
        })
    }
}
