//! OAuth 2.0 Authorization Code Flow with PKCE
//!
//! Builds the authorization URL for a confidential client, then shows the
//! code exchange and how the resulting bearer token is authenticated.
//!
//! Flow:
//! 1. Client sends the user to the authorization URL
//! 2. Authority redirects back with `code` and `state`
//! 3. Client exchanges the code (plus the PKCE verifier) for tokens
//! 4. Resource server authenticates the access token against the JWK Set

use turbomcp_auth::{
    AuthError, AuthorizeParams, Credentials, OAuth2ClientConfig, OAuth2FlowType, OAuth2Provider,
};

// RFC 7636 Appendix B
const CODE_VERIFIER: &str = "dBjftJeZ4CVP-mJ92K9qpvv_gXLIUC4Lq5r_EYBX5vA";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = OAuth2ClientConfig::new("https://provider.example.com", "my-client-id")
        .with_client_secret("my-client-secret")
        .with_flow(OAuth2FlowType::AuthorizationCode)
        .with_leeway(30);
    let provider = OAuth2Provider::builder(config).build()?;

    println!("=== OAuth 2.0 Authorization Code Flow ===\n");

    let redirect_uri = "http://localhost:8080/callback".to_string();
    let state = uuid::Uuid::new_v4().to_string();
    let params = AuthorizeParams {
        redirect_uri: Some(redirect_uri.clone()),
        scopes: vec!["openid".into(), "profile".into(), "email".into()],
        state: Some(state.clone()),
        ..Default::default()
    }
    .with_pkce_verifier(CODE_VERIFIER)?;
    let url = provider.authorize_url(&params)?;

    println!("1. Authorization URL (open in browser):");
    println!("   {url}\n");
    println!("2. Authority redirects to:");
    println!("   {redirect_uri}?code=AUTH_CODE&state={state}\n");

    println!("3. Exchanging the code...");
    let exchange = provider
        .authenticate(Credentials::AuthorizationCode {
            code: "AUTH_CODE".into(),
            redirect_uri: Some(redirect_uri),
            code_verifier: Some(CODE_VERIFIER.into()),
        })
        .await;

    match exchange {
        Ok(session) => {
            println!("   access token expires at {:?}", session.expires_at());
            if let Some(token) = session.access_token() {
                provider.load_keys().await?;
                let verified = provider.authenticate(Credentials::bearer(token)).await?;
                println!("4. Authenticated subject: {:?}", verified.subject());
            }
        }
        Err(AuthError::Fetch(e)) => println!("   authority unreachable: {e}"),
        Err(e) => println!("   exchange rejected: {e}"),
    }

    Ok(())
}
