//! Inputs and collaborator contracts for the callback resolver.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::outcome::{CallbackOutcome, LoginResponse};
use crate::models::{connected_account, user};
use crate::repositories::StoreError;

pub type User = user::Model;
pub type ConnectedAccount = connected_account::Model;

/// Identity returned by a provider after a successful code exchange
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub provider: String,
    /// Account identifier at the provider
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ProviderIdentity {
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
            email: None,
            name: None,
            nickname: None,
            avatar: None,
            token: None,
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Email with surrounding whitespace removed; blank counts as missing
    pub fn email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    /// Best available display name for a new local user
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .or(self.nickname.as_deref())
            .or(self.email())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} user {}", self.provider, self.id))
    }
}

impl fmt::Debug for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderIdentity")
            .field("provider", &self.provider)
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("nickname", &self.nickname)
            .field("avatar", &self.avatar)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// What came back from the provider redirect
#[derive(Debug, Clone)]
pub enum ProviderResult {
    Identity(ProviderIdentity),
    /// The provider (or the exchange with it) reported an error
    Error { description: String },
    /// The callback's OAuth state did not match the pending authorization
    InvalidState,
}

/// Session state the policy depends on
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub user: Option<User>,
    /// The redirect started from the registration page
    pub from_registration: bool,
}

impl SessionContext {
    pub fn guest() -> Self {
        Self::default()
    }

    pub fn authenticated(user: User) -> Self {
        Self {
            user: Some(user),
            from_registration: false,
        }
    }

    pub fn from_registration(mut self) -> Self {
        self.from_registration = true;
        self
    }
}

/// `FindUserByEmail` plus loading the owner of a link
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

/// `FindConnectedAccount`, `CreateConnectedAccount`, `CreateUserFromProvider`
#[async_trait]
pub trait AccountLinker: Send + Sync {
    async fn find_connected_account(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<ConnectedAccount>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the pair is already linked
    async fn create_connected_account(
        &self,
        user: &User,
        provider: &str,
        identity: &ProviderIdentity,
    ) -> Result<ConnectedAccount, StoreError>;

    /// Creates the user and its first link atomically. Fails with
    /// [`StoreError::Conflict`] when the email is already registered.
    async fn create_user_from_provider(
        &self,
        provider: &str,
        identity: &ProviderIdentity,
    ) -> Result<User, StoreError>;
}

/// `UpdateConnectedAccount` plus the user's current-link pointer
#[async_trait]
pub trait AccountUpdater: Send + Sync {
    async fn update_connected_account(
        &self,
        user: &User,
        account: &ConnectedAccount,
        provider: &str,
        identity: &ProviderIdentity,
    ) -> Result<ConnectedAccount, StoreError>;

    async fn set_current_connected_account(
        &self,
        user: &User,
        account: &ConnectedAccount,
    ) -> Result<(), StoreError>;
}

/// `LoginUser`, bound to the request's session
#[async_trait]
pub trait SessionLogin: Send {
    async fn login(&mut self, user: &User, remember: bool) -> Result<LoginResponse, StoreError>;
}

/// Decides what an OAuth state mismatch turns into
pub trait InvalidStateHandler: Send + Sync {
    fn handle(&self, provider: &str, session: &SessionContext) -> CallbackOutcome;
}
