//! # HTTP Handlers
//!
//! Endpoint handlers for the accountlink service: provider redirects and
//! callbacks, session introspection, logout and service info.

use axum::{
    http::header::SET_COOKIE,
    response::{IntoResponse, Json, Redirect, Response},
};

use crate::error::ApiError;
use crate::models::ServiceInfo;
use crate::resolver::RedirectTarget;
use crate::server::AppState;
use crate::session::SessionHandle;

pub mod oauth;
pub mod session;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Application path for a redirect target
pub(crate) fn route_for(state: &AppState, target: RedirectTarget) -> &str {
    let routes = &state.config.routes;
    match target {
        RedirectTarget::Home => &routes.home,
        RedirectTarget::Login => &routes.login,
        RedirectTarget::Register => &routes.register,
        RedirectTarget::Profile => &routes.profile,
    }
}

/// Persist the session and answer with a 303 to `location`
pub(crate) async fn redirect_with_session(
    state: &AppState,
    session: SessionHandle,
    location: &str,
) -> Result<Response, ApiError> {
    let cookie = state.sessions.persist(session).await?;

    let mut response = Redirect::to(location).into_response();
    if let Some(cookie) = cookie {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    Ok(response)
}
