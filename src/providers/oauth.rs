//! Authorization-code OAuth 2.0 provider client
//!
//! One [`OAuthProvider`] per configured provider. The authorize redirect
//! carries a caller-supplied CSRF state and an S256 PKCE challenge; the
//! callback exchanges the code, reads the profile endpoint, and maps the
//! JSON onto a [`ProviderIdentity`].

use async_trait::async_trait;
use chrono::Utc;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{AuthorizationRequest, IdentityProvider, ProviderError, presets};
use crate::config::ProviderCredentials;
use crate::resolver::ProviderIdentity;

const USER_AGENT: &str = concat!("accountlink/", env!("CARGO_PKG_VERSION"));
const BODY_SNIPPET_LEN: usize = 200;

/// OAuth 2.0 provider backed by the `oauth2` crate and `reqwest`
#[derive(Debug, Clone)]
pub struct OAuthProvider {
    name: String,
    display_name: String,
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    userinfo_url: Url,
    emails_url: Option<Url>,
    scopes: Vec<String>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ProviderEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

impl OAuthProvider {
    /// Build a provider from configured credentials, filling unset endpoints
    /// and scopes from the built-in preset for `name`.
    pub fn from_credentials(
        name: &str,
        credentials: &ProviderCredentials,
        redirect_url: Url,
    ) -> Result<Self, ProviderError> {
        let preset = presets::preset(name);

        let endpoint = |configured: &Option<String>,
                        fallback: Option<&'static str>,
                        field: &'static str|
         -> Result<String, ProviderError> {
            configured
                .clone()
                .or_else(|| fallback.map(str::to_string))
                .ok_or_else(|| ProviderError::Configuration {
                    provider: name.to_string(),
                    details: format!("{field} is required for providers without a preset"),
                })
        };

        let auth_url = endpoint(&credentials.auth_url, preset.map(|p| p.auth_url), "auth url")?;
        let token_url = endpoint(&credentials.token_url, preset.map(|p| p.token_url), "token url")?;
        let userinfo_url = endpoint(
            &credentials.userinfo_url,
            preset.map(|p| p.userinfo_url),
            "userinfo url",
        )?;
        let emails_url = credentials
            .emails_url
            .clone()
            .or_else(|| preset.and_then(|p| p.emails_url).map(str::to_string));

        let scopes = credentials.scopes.clone().unwrap_or_else(|| {
            preset
                .map(|p| p.scopes.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default()
        });

        let invalid = |field: &'static str, err: url::ParseError| ProviderError::Configuration {
            provider: name.to_string(),
            details: format!("invalid {field}: {err}"),
        };

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            // Token and profile endpoints must answer directly.
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            name: name.to_string(),
            display_name: presets::display_name(name),
            client_id: ClientId::new(credentials.client_id.clone()),
            client_secret: ClientSecret::new(credentials.client_secret.clone()),
            auth_url: AuthUrl::new(auth_url).map_err(|e| invalid("auth url", e))?,
            token_url: TokenUrl::new(token_url).map_err(|e| invalid("token url", e))?,
            redirect_url: RedirectUrl::from_url(redirect_url),
            userinfo_url: Url::parse(&userinfo_url).map_err(|e| invalid("userinfo url", e))?,
            emails_url: emails_url
                .map(|url| Url::parse(&url))
                .transpose()
                .map_err(|e| invalid("emails url", e))?,
            scopes,
            http,
        })
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &Url,
        access_token: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: self.name.clone(),
                status: status.as_u16(),
                body_snippet: truncate(body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::MalformedProfile {
                provider: self.name.clone(),
                details: e.to_string(),
            })
    }

    /// Primary verified address from a GitHub-style `/user/emails` listing
    async fn primary_verified_email(
        &self,
        url: &Url,
        access_token: &str,
    ) -> Result<Option<String>, ProviderError> {
        let emails: Vec<ProviderEmail> = self.get_json(url, access_token).await?;
        Ok(emails
            .into_iter()
            .find(|entry| entry.primary && entry.verified)
            .map(|entry| entry.email))
    }
}

#[async_trait]
impl IdentityProvider for OAuthProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn authorization_request(&self, state: &str) -> AuthorizationRequest {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let csrf = state.to_string();
        let mut request = client
            .authorize_url(move || CsrfToken::new(csrf))
            .set_pkce_challenge(pkce_challenge);
        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (url, _csrf) = request.url();

        AuthorizationRequest {
            url,
            pkce_verifier: pkce_verifier.secret().clone(),
        }
    }

    async fn resolve_identity(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| ProviderError::TokenExchange {
                provider: self.name.clone(),
                details: e.to_string(),
            })?;

        let access_token = token.access_token().secret().clone();
        let profile: Value = self.get_json(&self.userinfo_url, &access_token).await?;
        let mut identity = identity_from_profile(&self.name, &profile)?;

        if identity.email().is_none()
            && let Some(emails_url) = &self.emails_url
        {
            identity.email = self
                .primary_verified_email(emails_url, &access_token)
                .await?;
        }

        identity.expires_at = token
            .expires_in()
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| Utc::now() + ttl);
        identity.refresh_token = token.refresh_token().map(|t| t.secret().clone());
        identity.token = Some(access_token);

        tracing::debug!(
            provider = %self.name,
            provider_id = %identity.id,
            has_email = identity.email().is_some(),
            "Provider identity resolved"
        );

        Ok(identity)
    }
}

fn truncate(body: String) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    if body.chars().count() > BODY_SNIPPET_LEN {
        let truncated: String = body.chars().take(BODY_SNIPPET_LEN).collect();
        Some(format!("{}...", truncated))
    } else {
        Some(body)
    }
}

fn first_string(profile: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match profile.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Map a userinfo document onto an identity.
///
/// Covers GitHub (`id`, `login`, `avatar_url`), GitLab (`id`, `username`)
/// and OpenID Connect (`sub`, `preferred_username`, `picture`) shapes.
pub fn identity_from_profile(
    provider: &str,
    profile: &Value,
) -> Result<ProviderIdentity, ProviderError> {
    let id = first_string(profile, &["id", "sub"]).ok_or_else(|| {
        ProviderError::MalformedProfile {
            provider: provider.to_string(),
            details: "profile has no account id".to_string(),
        }
    })?;

    let mut identity = ProviderIdentity::new(provider, id);
    identity.email = first_string(profile, &["email"]);
    identity.name = first_string(profile, &["name"]);
    identity.nickname = first_string(profile, &["login", "username", "preferred_username"]);
    identity.avatar = first_string(profile, &["avatar_url", "picture"]);

    // OIDC marks unverified addresses explicitly; don't trust them for linking.
    if profile.get("email_verified") == Some(&Value::Bool(false)) {
        identity.email = None;
    }

    Ok(identity)
}
