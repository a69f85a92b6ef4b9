//! # Session Handlers
//!
//! Session introspection for the front end and logout.

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{redirect_with_session, route_for};
use crate::error::ApiError;
use crate::resolver::RedirectTarget;
use crate::server::AppState;
use crate::session::{Flash, SessionHandle};

/// Authenticated user summary
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub email_verified_at: Option<DateTime<Utc>>,
}

/// A provider identity linked to the authenticated user
#[derive(Debug, Serialize, ToSchema)]
pub struct LinkedAccount {
    pub id: Uuid,
    pub provider: String,
    pub provider_id: String,
    pub nickname: Option<String>,
    pub avatar_path: Option<String>,
    /// Used for the most recent provider login
    pub current: bool,
    pub created_at: DateTime<Utc>,
}

/// Current session state
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    pub connected_accounts: Vec<LinkedAccount>,
    /// Banner and field errors left by the previous request; consumed by this call
    pub flash: Flash,
}

/// Get the current session
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Session state; flash data is consumed", body = SessionResponse),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "session"
)]
pub async fn current_session(
    State(state): State<AppState>,
    mut session: SessionHandle,
) -> Result<Response, ApiError> {
    let user = match session.user_id() {
        Some(user_id) => state.users.find_by_id(user_id).await?,
        None => None,
    };

    let connected_accounts = match &user {
        Some(user) => state
            .accounts
            .list_for_user(user.id)
            .await?
            .into_iter()
            .map(|account| LinkedAccount {
                current: user.current_connected_account_id == Some(account.id),
                id: account.id,
                provider: account.provider,
                provider_id: account.provider_id,
                nickname: account.nickname,
                avatar_path: account.avatar_path,
                created_at: account.created_at,
            })
            .collect(),
        None => Vec::new(),
    };

    let flash = session.take_flash();
    let body = SessionResponse {
        authenticated: user.is_some(),
        user: user.map(|user| SessionUser {
            id: user.id,
            name: user.name,
            email: user.email,
            email_verified_at: user.email_verified_at,
        }),
        connected_accounts,
        flash,
    };

    let cookie = state.sessions.persist(session).await?;
    let mut response = Json(body).into_response();
    if let Some(cookie) = cookie {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    Ok(response)
}

/// Log out
///
/// Clears the authenticated user, issues a new session token and redirects
/// to the home page.
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 303, description = "Logged out; redirect to the home page"),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "session"
)]
pub async fn logout(
    State(state): State<AppState>,
    mut session: SessionHandle,
) -> Result<Response, ApiError> {
    if let Some(user_id) = session.user_id() {
        tracing::info!(user_id = %user_id, "User logged out");
    }
    session.logout();

    let location = route_for(&state, RedirectTarget::Home).to_string();
    redirect_with_session(&state, session, &location).await
}
