//! # Sessions
//!
//! Server-side sessions addressed by an opaque cookie token. The session
//! carries the authenticated user, the URL the visitor came from before the
//! provider redirect, the pending OAuth authorization, and one-shot flash
//! data (banner plus per-provider errors).

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, HeaderValue, header::COOKIE, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use url::Url;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::repositories::{SessionRepository, StoreError};
use crate::resolver::{LoginResponse, NoticeStyle, SessionLogin, User};

/// How long a pending provider redirect stays valid
pub const PENDING_AUTHORIZATION_TTL_MINUTES: i64 = 10;

/// 32 random bytes, URL-safe base64. Used for session tokens and OAuth state.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    base64_url::encode(&bytes)
}

/// Constant-time comparison of an OAuth state parameter
pub fn state_matches(expected: &str, received: &str) -> bool {
    expected.as_bytes().ct_eq(received.as_bytes()).into()
}

/// A provider redirect waiting for its callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub provider: String,
    pub state: String,
    pub pkce_verifier: String,
    pub created_at: DateTime<Utc>,
}

impl PendingAuthorization {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::minutes(PENDING_AUTHORIZATION_TTL_MINUTES)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BannerStyle {
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Banner {
    pub style: BannerStyle,
    pub message: String,
}

/// Data shown once on the next page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Flash {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    /// Form errors keyed by field (the provider name for OAuth failures)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

impl Flash {
    pub fn is_empty(&self) -> bool {
        self.banner.is_none() && self.errors.is_empty()
    }
}

/// Serialized session payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub remember: bool,
    /// Page the visitor was on before being sent to a provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingAuthorization>,
    #[serde(default, skip_serializing_if = "Flash::is_empty")]
    pub flash: Flash,
}

impl SessionData {
    /// Attach a notice from a callback outcome to the flash data
    pub fn flash_notice(&mut self, style: NoticeStyle, field: &str, message: String) {
        match style {
            NoticeStyle::Banner => {
                self.flash.banner = Some(Banner {
                    style: BannerStyle::Success,
                    message,
                })
            }
            NoticeStyle::DangerBanner => {
                self.flash.banner = Some(Banner {
                    style: BannerStyle::Danger,
                    message,
                })
            }
            NoticeStyle::FieldError => {
                self.flash.errors.insert(field.to_string(), message);
            }
        }
    }
}

/// Whether `previous_url` points at the registration page (same origin and path)
pub fn is_registration_arrival(previous_url: Option<&str>, register_url: &Url) -> bool {
    let Some(previous) = previous_url else {
        return false;
    };
    let Ok(previous) = register_url.join(previous) else {
        return false;
    };

    previous.origin() == register_url.origin()
        && previous.path().trim_end_matches('/') == register_url.path().trim_end_matches('/')
}

/// Read a cookie value from every `Cookie` header
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// A request's session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    token: String,
    /// Token replaced by [`SessionHandle::regenerate`], deleted on persist
    retired_token: Option<String>,
    data: SessionData,
    stored: bool,
    dirty: bool,
}

impl SessionHandle {
    fn fresh() -> Self {
        Self {
            token: generate_token(),
            retired_token: None,
            data: SessionData::default(),
            stored: false,
            dirty: false,
        }
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut SessionData {
        self.dirty = true;
        &mut self.data
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.data.user_id
    }

    /// Issue a new token for the same data (on login and logout)
    pub fn regenerate(&mut self) {
        let old = std::mem::replace(&mut self.token, generate_token());
        if self.stored && self.retired_token.is_none() {
            self.retired_token = Some(old);
        }
        self.dirty = true;
    }

    /// Consume the flash data
    pub fn take_flash(&mut self) -> Flash {
        if self.data.flash.is_empty() {
            return Flash::default();
        }
        self.dirty = true;
        std::mem::take(&mut self.data.flash)
    }

    /// Consume the pending OAuth authorization
    pub fn take_pending(&mut self) -> Option<PendingAuthorization> {
        let pending = self.data.pending.take();
        if pending.is_some() {
            self.dirty = true;
        }
        pending
    }

    /// Clear the authenticated user and start over with a new token
    pub fn logout(&mut self) {
        self.data = SessionData::default();
        self.regenerate();
    }
}

/// Loads and persists sessions, and formats the session cookie
#[derive(Debug, Clone)]
pub struct SessionStore {
    repository: SessionRepository,
    cookie_name: String,
    lifetime: Duration,
    remember_lifetime: Duration,
    secure: bool,
}

impl SessionStore {
    pub fn new(repository: SessionRepository, config: &AppConfig) -> Self {
        Self {
            repository,
            cookie_name: config.session.cookie_name.clone(),
            lifetime: Duration::minutes(config.session.lifetime_minutes),
            remember_lifetime: Duration::days(config.session.remember_lifetime_days),
            secure: config.app_url.starts_with("https://"),
        }
    }

    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        self.repository.purge_expired().await
    }

    /// Load the session named by the request cookie, or start a fresh one
    pub async fn load(&self, headers: &HeaderMap) -> Result<SessionHandle, StoreError> {
        let Some(token) = read_cookie(headers, &self.cookie_name) else {
            return Ok(SessionHandle::fresh());
        };

        let Some(record) = self.repository.find_active(&token).await? else {
            tracing::debug!("Session cookie did not match an active session");
            return Ok(SessionHandle::fresh());
        };

        let data: SessionData = match serde_json::from_value(record.payload) {
            Ok(data) => data,
            Err(error) => {
                tracing::warn!(%error, "Discarding unreadable session payload");
                return Ok(SessionHandle::fresh());
            }
        };

        Ok(SessionHandle {
            token,
            retired_token: None,
            data,
            stored: true,
            dirty: false,
        })
    }

    /// Write a modified session back and return the `Set-Cookie` value to send
    pub async fn persist(&self, handle: SessionHandle) -> Result<Option<HeaderValue>, StoreError> {
        if !handle.dirty {
            return Ok(None);
        }

        if let Some(retired) = &handle.retired_token {
            self.repository.delete(retired).await?;
        }

        let lifetime = if handle.data.remember {
            self.remember_lifetime
        } else {
            self.lifetime
        };
        let payload = serde_json::to_value(&handle.data)?;
        self.repository
            .upsert(
                &handle.token,
                handle.data.user_id,
                payload,
                Utc::now() + lifetime,
            )
            .await?;

        Ok(HeaderValue::from_str(&self.cookie(&handle.token, lifetime.num_seconds())).ok())
    }

    fn cookie(&self, token: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie_name, token, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

impl<S> FromRequestParts<S> for SessionHandle
where
    SessionStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = SessionStore::from_ref(state);
        Ok(store.load(&parts.headers).await?)
    }
}

/// Logs a user into the wrapped session
pub struct SessionGuard<'a> {
    handle: &'a mut SessionHandle,
}

impl<'a> SessionGuard<'a> {
    pub fn new(handle: &'a mut SessionHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl SessionLogin for SessionGuard<'_> {
    async fn login(&mut self, user: &User, remember: bool) -> Result<LoginResponse, StoreError> {
        self.handle.regenerate();
        let data = self.handle.data_mut();
        data.user_id = Some(user.id);
        data.remember = remember;
        data.pending = None;

        tracing::info!(user_id = %user.id, remember, "User logged in");
        Ok(LoginResponse {
            user_id: user.id,
            remember,
        })
    }
}
