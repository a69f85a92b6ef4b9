//! # Identity Providers
//!
//! `IdentityProvider` is the seam between the HTTP handlers and a concrete
//! OAuth provider: it builds the authorize redirect and turns a callback
//! code into a [`ProviderIdentity`].

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::resolver::ProviderIdentity;

pub mod oauth;
pub mod presets;
pub mod registry;

pub use oauth::OAuthProvider;
pub use presets::display_name;
pub use registry::{ProviderRegistry, RegistryError};

/// Errors raised while talking to a provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider '{provider}' is misconfigured: {details}")]
    Configuration { provider: String, details: String },
    #[error("token exchange with '{provider}' failed: {details}")]
    TokenExchange { provider: String, details: String },
    #[error("provider '{provider}' returned HTTP {status}")]
    Api {
        provider: String,
        status: u16,
        body_snippet: Option<String>,
    },
    #[error("provider '{provider}' returned a malformed profile: {details}")]
    MalformedProfile { provider: String, details: String },
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Redirect to the provider plus the PKCE verifier to keep in the session
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub pkce_verifier: String,
}

/// An OAuth identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Lowercase provider name used in routes and storage
    fn name(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Build the authorize URL for `state`, with a fresh PKCE challenge
    fn authorization_request(&self, state: &str) -> AuthorizationRequest;

    /// Exchange an authorization code and fetch the account profile
    async fn resolve_identity(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<ProviderIdentity, ProviderError>;
}
