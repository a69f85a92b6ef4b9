//! # OAuth Handlers
//!
//! Redirect-to-provider and handle-provider-callback. The callback handler
//! validates the pending authorization, resolves the provider identity, runs
//! the callback resolver and turns its outcome into flash data plus a
//! redirect.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::REFERER},
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use url::Url;
use utoipa::IntoParams;

use super::{redirect_with_session, route_for};
use crate::error::{ApiError, not_found};
use crate::providers::{IdentityProvider, RegistryError};
use crate::resolver::{
    CallbackOutcome, Message, MessageKey, ProviderResult, SessionContext,
};
use crate::server::AppState;
use crate::session::{
    PendingAuthorization, SessionGuard, SessionHandle, generate_token, is_registration_arrival,
    state_matches,
};

const MAX_AUTHORIZE_URL_LEN: usize = 2048;

/// Query parameters a provider sends back to the callback
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// CSRF state echoed by the provider
    pub state: Option<String>,
    /// OAuth error code (e.g. `access_denied`)
    pub error: Option<String>,
    /// Human-readable error from the provider
    pub error_description: Option<String>,
}

fn provider_or_404(state: &AppState, provider: &str) -> Result<Arc<dyn IdentityProvider>, ApiError> {
    state
        .registry
        .get(provider)
        .map_err(|RegistryError::ProviderNotFound { name }| {
            not_found(&format!("provider '{}' not found", name))
                .with_details(json!({ "available": state.registry.names() }))
        })
}

/// Reject authorize URLs that are not plain HTTPS (loopback excepted), carry a
/// fragment, or exceed 2048 characters.
fn validate_authorize_url(url: &Url) -> Result<(), ApiError> {
    let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
    if url.scheme() != "https" && !loopback {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Provider authorization URL must use HTTPS",
        ));
    }

    if url.fragment().is_some() {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Provider authorization URL must not include a fragment",
        ));
    }

    if url.as_str().len() > MAX_AUTHORIZE_URL_LEN {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Provider authorization URL exceeds 2048 characters",
        ));
    }

    Ok(())
}

/// Redirect to a provider
///
/// Records where the visitor came from, stores a fresh CSRF state and PKCE
/// verifier in the session, and redirects to the provider's authorize URL.
#[utoipa::path(
    get,
    path = "/oauth/{provider}",
    params(
        ("provider" = String, Path, description = "Provider name (e.g. 'github')")
    ),
    responses(
        (status = 303, description = "Redirect to the provider authorization page"),
        (status = 404, description = "Provider not configured", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "oauth"
)]
pub async fn redirect_to_provider(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    mut session: SessionHandle,
) -> Result<Response, ApiError> {
    let identity_provider = provider_or_404(&state, &provider)?;

    let previous_url = headers
        .get(REFERER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| state.config.routes.home.clone());

    let csrf_state = generate_token();
    let request = identity_provider.authorization_request(&csrf_state);
    validate_authorize_url(&request.url)?;

    let data = session.data_mut();
    data.previous_url = Some(previous_url);
    data.pending = Some(PendingAuthorization {
        provider: provider.clone(),
        state: csrf_state,
        pkce_verifier: request.pkce_verifier,
        created_at: Utc::now(),
    });

    tracing::info!(provider = %provider, "Redirecting to identity provider");

    redirect_with_session(&state, session, request.url.as_str()).await
}

/// Handle a provider callback
///
/// Always answers with a redirect: to the home page after a login, to the
/// profile page after linking, or to the login/registration page with an
/// error keyed by the provider.
#[utoipa::path(
    get,
    path = "/oauth/{provider}/callback",
    params(
        ("provider" = String, Path, description = "Provider name (e.g. 'github')"),
        CallbackParams
    ),
    responses(
        (status = 303, description = "Redirect to the page chosen by the callback policy"),
        (status = 404, description = "Provider not configured", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "oauth"
)]
pub async fn handle_provider_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    mut session: SessionHandle,
) -> Result<Response, ApiError> {
    let identity_provider = provider_or_404(&state, &provider)?;

    let user = match session.user_id() {
        Some(user_id) => state.users.find_by_id(user_id).await?,
        None => None,
    };
    let register_url = state
        .config
        .absolute_url(&state.config.routes.register)
        .map_err(|e| anyhow::anyhow!("invalid register route: {e}"))?;
    let context = SessionContext {
        user,
        from_registration: is_registration_arrival(
            session.data().previous_url.as_deref(),
            &register_url,
        ),
    };

    let now = Utc::now();
    let state_verified = session.data().pending.as_ref().is_some_and(|pending| {
        pending.provider == provider
            && !pending.is_expired(now)
            && params
                .state
                .as_deref()
                .is_some_and(|received| state_matches(&pending.state, received))
    });

    // An error carrying a state we did not issue leaves the pending authorization alone.
    let foreign_error = params.error.is_some() && params.state.is_some() && !state_verified;

    let outcome = match params.error {
        Some(_) if foreign_error => {
            resolve(&state, &provider, ProviderResult::InvalidState, &context, &mut session)
                .await?
        }
        Some(error) => {
            session.take_pending();
            let description = params
                .error_description
                .filter(|description| !description.trim().is_empty())
                .unwrap_or(error);
            resolve(&state, &provider, ProviderResult::Error { description }, &context, &mut session)
                .await?
        }
        None => match session.take_pending().filter(|_| state_verified) {
            None => {
                resolve(&state, &provider, ProviderResult::InvalidState, &context, &mut session)
                    .await?
            }
            Some(pending) => {
                let result =
                    exchange(identity_provider.as_ref(), params.code.as_deref(), &pending).await;
                resolve(&state, &provider, result, &context, &mut session).await?
            }
        },
    };

    let data = session.data_mut();
    if !foreign_error {
        data.previous_url = None;
    }
    if let Some(notice) = &outcome.notice {
        data.flash_notice(notice.style, &notice.field, notice.message.render());
    }

    let location = route_for(&state, outcome.redirect).to_string();
    redirect_with_session(&state, session, &location).await
}

async fn resolve(
    state: &AppState,
    provider: &str,
    result: ProviderResult,
    context: &SessionContext,
    session: &mut SessionHandle,
) -> Result<CallbackOutcome, ApiError> {
    let mut guard = SessionGuard::new(session);
    Ok(state
        .resolver
        .resolve_callback(provider, result, context, &mut guard)
        .await?)
}

/// Exchange the code; any failure becomes a provider error with a generic message
async fn exchange(
    identity_provider: &dyn IdentityProvider,
    code: Option<&str>,
    pending: &PendingAuthorization,
) -> ProviderResult {
    let unavailable = || ProviderResult::Error {
        description: Message::new(MessageKey::ProviderUnavailable)
            .with("Provider", identity_provider.display_name())
            .render(),
    };

    let Some(code) = code.filter(|code| !code.is_empty()) else {
        tracing::warn!(
            provider = %identity_provider.name(),
            "Callback carried a valid state but no authorization code"
        );
        return unavailable();
    };

    match identity_provider
        .resolve_identity(code, &pending.pkce_verifier)
        .await
    {
        Ok(identity) => ProviderResult::Identity(identity),
        Err(error) => {
            tracing::warn!(
                provider = %identity_provider.name(),
                error = %error,
                "Provider code exchange failed"
            );
            unavailable()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_authorize_url() {
        let ok = Url::parse("https://github.com/login/oauth/authorize?state=x").unwrap();
        assert!(validate_authorize_url(&ok).is_ok());

        let loopback = Url::parse("http://127.0.0.1:4010/authorize").unwrap();
        assert!(validate_authorize_url(&loopback).is_ok());

        let plain = Url::parse("http://provider.test/authorize").unwrap();
        assert!(validate_authorize_url(&plain).is_err());

        let fragment = Url::parse("https://provider.test/authorize#frag").unwrap();
        assert!(validate_authorize_url(&fragment).is_err());

        let long = Url::parse(&format!("https://provider.test/authorize?x={}", "a".repeat(2100)))
            .unwrap();
        assert!(validate_authorize_url(&long).is_err());
    }
}
