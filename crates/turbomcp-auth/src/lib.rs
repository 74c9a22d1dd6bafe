//! # TurboMCP Auth - OAuth2 Bearer Token Authentication
//!
//! Authenticates callers against an OAuth2 authority. Bearer tokens are
//! verified locally with keys from the authority's JWK Set, and introspected
//! (RFC 7662) when local verification is not possible. Other credentials are
//! exchanged at the token endpoint through the configured grant.
//!
//! ## Architecture
//!
//! - [`provider`] - [`OAuth2Provider`], the orchestrator
//! - [`refresh`] - [`KeyRefreshCoordinator`]: JWK Set fetch, atomic store swap,
//!   Cache-Control rescheduling
//! - [`introspection`] - RFC 7662 client
//! - [`flows`] - authorization code, client credentials, password and jwt-bearer grants
//! - [`token`] - [`AccessToken`], the authenticated session
//! - [`fetch`] - [`Fetch`] HTTP seam and its reqwest implementation
//! - [`config`] - [`OAuth2ClientConfig`]
//! - [`diagnostics`] - non-fatal events (skipped keys, failed refreshes)
//!
//! Key material, signature verification and token decoding live in
//! [`turbomcp_jose`], re-exported as [`jose`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use turbomcp_auth::{Credentials, OAuth2ClientConfig, OAuth2Provider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OAuth2ClientConfig::new("https://auth.example.com", "my-client")
//!     .with_client_secret("s3cret")
//!     .with_leeway(5);
//! let provider = OAuth2Provider::builder(config).build()?;
//!
//! // Loads the JWK Set; honours Cache-Control max-age for later refreshes
//! provider.load_keys().await?;
//!
//! match provider.authenticate(Credentials::bearer("eyJhbGciOi...")).await {
//!     Ok(token) => println!("authenticated {:?}", token.subject()),
//!     Err(e) if e.is_expired() => println!("token expired"),
//!     Err(e) => println!("rejected: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fetch;
pub mod flows;
pub mod introspection;
pub mod provider;
pub mod refresh;
pub mod token;
pub mod types;

pub use turbomcp_jose as jose;

pub use config::{JwtBearerOptions, OAuth2ClientConfig, OAuth2FlowType};
pub use diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
pub use error::{AuthError, FetchError, Result};
pub use fetch::{Fetch, FetchRequest, FetchResponse, HttpFetch, Method};
pub use flows::Flow;
pub use introspection::{IntrospectionClient, IntrospectionResponse, Introspector};
pub use provider::{MissingKeyHandler, OAuth2Provider, OAuth2ProviderBuilder};
pub use refresh::{KeyRefreshCoordinator, RefreshOutcome};
pub use token::AccessToken;
pub use types::{AuthorizeParams, BearerToken, Credentials, TokenResponse};
