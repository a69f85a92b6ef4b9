//! # OAuth Callback Policy Resolver
//!
//! Decides what a provider callback means for the local account system:
//! link the identity to the signed-in user, register a new user, log an
//! existing user in, or reject with a message. Storage and session effects
//! go through the collaborator traits in [`collaborators`]; the resolver
//! itself holds no state beyond the feature switches.
//!
//! Precedence, top to bottom:
//!
//! 1. provider error
//! 2. authenticated session (link / conflict / already linked)
//! 3. registration arrival with registration enabled and no existing link
//! 4. generic login (existing link, auto-create, or not found)

use std::sync::Arc;

pub mod collaborators;
pub mod outcome;

#[cfg(test)]
mod tests;

pub use collaborators::{
    AccountLinker, AccountUpdater, ConnectedAccount, InvalidStateHandler, ProviderIdentity,
    ProviderResult, SessionContext, SessionLogin, User, UserLookup,
};
pub use outcome::{
    CallbackOutcome, LoginResponse, Message, MessageKey, Notice, NoticeStyle, OutcomeKind,
    RedirectTarget, Rejection,
};

use crate::config::Features;
use crate::providers::display_name;
use crate::repositories::{CONNECTED_ACCOUNT, StoreError};

/// Default [`InvalidStateHandler`]: back to the login page with an error
/// keyed by the provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectToLogin;

impl InvalidStateHandler for RedirectToLogin {
    fn handle(&self, provider: &str, _session: &SessionContext) -> CallbackOutcome {
        CallbackOutcome::rejected(
            Rejection::InvalidState,
            RedirectTarget::Login,
            NoticeStyle::FieldError,
            provider,
            message(MessageKey::InvalidState, provider),
        )
    }
}

fn message(key: MessageKey, provider: &str) -> Message {
    Message::new(key).with("Provider", display_name(provider))
}

/// The callback decision table
#[derive(Clone)]
pub struct CallbackResolver {
    users: Arc<dyn UserLookup>,
    accounts: Arc<dyn AccountLinker>,
    updater: Arc<dyn AccountUpdater>,
    invalid_state: Arc<dyn InvalidStateHandler>,
    features: Features,
}

impl CallbackResolver {
    pub fn new(
        users: Arc<dyn UserLookup>,
        accounts: Arc<dyn AccountLinker>,
        updater: Arc<dyn AccountUpdater>,
        features: Features,
    ) -> Self {
        Self {
            users,
            accounts,
            updater,
            invalid_state: Arc::new(RedirectToLogin),
            features,
        }
    }

    pub fn with_invalid_state_handler(mut self, handler: Arc<dyn InvalidStateHandler>) -> Self {
        self.invalid_state = handler;
        self
    }

    /// Resolve one provider callback into an outcome.
    ///
    /// Rejections are returned as outcomes; only storage failures other than
    /// unique-constraint races surface as `Err`.
    #[tracing::instrument(skip_all, fields(provider = %provider, outcome = tracing::field::Empty))]
    pub async fn resolve_callback(
        &self,
        provider: &str,
        result: ProviderResult,
        session: &SessionContext,
        login: &mut dyn SessionLogin,
    ) -> Result<CallbackOutcome, StoreError> {
        let outcome = match result {
            ProviderResult::Error { description } => {
                self.provider_error(provider, &description, session)
            }
            ProviderResult::InvalidState => self.resolve_invalid_state(provider, session),
            ProviderResult::Identity(identity) => {
                self.resolve_identity(provider, &identity, session, login)
                    .await?
            }
        };

        tracing::Span::current().record("outcome", outcome.label());
        tracing::info!(
            user_id = ?session.user.as_ref().map(|user| user.id),
            from_registration = session.from_registration,
            redirect = ?outcome.redirect,
            "OAuth callback resolved"
        );

        Ok(outcome)
    }

    /// Route an OAuth state mismatch to the configured handler. Never touches
    /// account data.
    ///
    /// [`resolve_callback`](Self::resolve_callback) calls this for
    /// [`ProviderResult::InvalidState`].
    pub fn resolve_invalid_state(&self, provider: &str, session: &SessionContext) -> CallbackOutcome {
        tracing::warn!(provider = %provider, "OAuth state mismatch on callback");
        self.invalid_state.handle(provider, session)
    }

    fn provider_error(
        &self,
        provider: &str,
        description: &str,
        session: &SessionContext,
    ) -> CallbackOutcome {
        let message = message(MessageKey::ProviderError, provider).with("description", description);

        if session.user.is_some() {
            return CallbackOutcome {
                kind: OutcomeKind::ProviderErrorReported,
                redirect: RedirectTarget::Home,
                notice: Some(Notice {
                    style: NoticeStyle::DangerBanner,
                    field: provider.to_string(),
                    message,
                }),
            };
        }

        CallbackOutcome::rejected(
            Rejection::ProviderError {
                description: description.to_string(),
            },
            RedirectTarget::Register,
            NoticeStyle::FieldError,
            provider,
            message,
        )
    }

    async fn resolve_identity(
        &self,
        provider: &str,
        identity: &ProviderIdentity,
        session: &SessionContext,
        login: &mut dyn SessionLogin,
    ) -> Result<CallbackOutcome, StoreError> {
        let account = self
            .accounts
            .find_connected_account(provider, &identity.id)
            .await?;

        if let Some(user) = &session.user {
            return self
                .link_to_authenticated(provider, identity, user, account)
                .await;
        }

        if session.from_registration && self.features.registration && account.is_none() {
            return self.register(provider, identity, login).await;
        }

        match account {
            Some(account) => self.login_linked(provider, identity, account, login).await,
            None if self.features.create_account_on_first_login => {
                self.create_on_first_login(provider, identity, login).await
            }
            None => Ok(CallbackOutcome::rejected(
                Rejection::NotFound,
                RedirectTarget::Login,
                NoticeStyle::FieldError,
                provider,
                message(MessageKey::AccountNotFound, provider),
            )),
        }
    }

    async fn link_to_authenticated(
        &self,
        provider: &str,
        identity: &ProviderIdentity,
        user: &User,
        account: Option<ConnectedAccount>,
    ) -> Result<CallbackOutcome, StoreError> {
        match account {
            Some(account) if account.user_id != user.id => Ok(self.linked_elsewhere(provider)),
            Some(_) => Ok(CallbackOutcome {
                kind: OutcomeKind::AlreadyLinked,
                redirect: RedirectTarget::Profile,
                notice: Some(Notice {
                    style: NoticeStyle::DangerBanner,
                    field: provider.to_string(),
                    message: message(MessageKey::AlreadyLinkedToYou, provider),
                }),
            }),
            None => match self
                .accounts
                .create_connected_account(user, provider, identity)
                .await
            {
                Ok(created) => Ok(CallbackOutcome {
                    kind: OutcomeKind::Linked {
                        connected_account_id: created.id,
                    },
                    redirect: RedirectTarget::Profile,
                    notice: Some(Notice {
                        style: NoticeStyle::Banner,
                        field: provider.to_string(),
                        message: message(MessageKey::Connected, provider),
                    }),
                }),
                Err(StoreError::Conflict(_)) => Ok(self.linked_elsewhere(provider)),
                Err(err) => Err(err),
            },
        }
    }

    fn linked_elsewhere(&self, provider: &str) -> CallbackOutcome {
        CallbackOutcome::rejected(
            Rejection::AlreadyLinkedConflict,
            RedirectTarget::Profile,
            NoticeStyle::DangerBanner,
            provider,
            message(MessageKey::AlreadyLinkedToOther, provider),
        )
    }

    async fn register(
        &self,
        provider: &str,
        identity: &ProviderIdentity,
        login: &mut dyn SessionLogin,
    ) -> Result<CallbackOutcome, StoreError> {
        let Some(email) = identity.email() else {
            return Ok(CallbackOutcome::rejected(
                Rejection::MissingEmail,
                RedirectTarget::Register,
                NoticeStyle::FieldError,
                provider,
                message(MessageKey::MissingEmail, provider),
            ));
        };

        let Some(user) = self.users.find_user_by_email(email).await? else {
            return self
                .create_user(provider, identity, RedirectTarget::Register, login)
                .await;
        };

        if !self.features.login_on_registration {
            return Ok(CallbackOutcome::rejected(
                Rejection::AlreadyRegistered,
                RedirectTarget::Login,
                NoticeStyle::FieldError,
                provider,
                message(MessageKey::AlreadyRegistered, provider),
            ));
        }

        let account = match self
            .accounts
            .create_connected_account(&user, provider, identity)
            .await
        {
            Ok(account) => account,
            Err(StoreError::Conflict(_)) => {
                return Ok(self.guest_linked_elsewhere(provider, RedirectTarget::Login));
            }
            Err(err) => return Err(err),
        };
        self.updater
            .set_current_connected_account(&user, &account)
            .await?;

        self.login(&user, false, login).await
    }

    async fn create_on_first_login(
        &self,
        provider: &str,
        identity: &ProviderIdentity,
        login: &mut dyn SessionLogin,
    ) -> Result<CallbackOutcome, StoreError> {
        let Some(email) = identity.email() else {
            return Ok(CallbackOutcome::rejected(
                Rejection::MissingEmail,
                RedirectTarget::Login,
                NoticeStyle::FieldError,
                provider,
                message(MessageKey::MissingEmail, provider),
            ));
        };

        if self.users.find_user_by_email(email).await?.is_some() {
            return Ok(self.email_taken(provider, RedirectTarget::Login));
        }

        self.create_user(provider, identity, RedirectTarget::Login, login)
            .await
    }

    async fn create_user(
        &self,
        provider: &str,
        identity: &ProviderIdentity,
        on_conflict: RedirectTarget,
        login: &mut dyn SessionLogin,
    ) -> Result<CallbackOutcome, StoreError> {
        match self
            .accounts
            .create_user_from_provider(provider, identity)
            .await
        {
            Ok(user) => self.login(&user, true, login).await,
            Err(StoreError::Conflict(CONNECTED_ACCOUNT)) => {
                Ok(self.guest_linked_elsewhere(provider, on_conflict))
            }
            Err(StoreError::Conflict(_)) => Ok(self.email_taken(provider, on_conflict)),
            Err(err) => Err(err),
        }
    }

    fn guest_linked_elsewhere(&self, provider: &str, redirect: RedirectTarget) -> CallbackOutcome {
        CallbackOutcome::rejected(
            Rejection::AlreadyLinkedConflict,
            redirect,
            NoticeStyle::FieldError,
            provider,
            message(MessageKey::AlreadyLinkedToOther, provider),
        )
    }

    fn email_taken(&self, provider: &str, redirect: RedirectTarget) -> CallbackOutcome {
        CallbackOutcome::rejected(
            Rejection::DuplicateEmail,
            redirect,
            NoticeStyle::FieldError,
            provider,
            message(MessageKey::EmailTaken, provider),
        )
    }

    async fn login_linked(
        &self,
        provider: &str,
        identity: &ProviderIdentity,
        account: ConnectedAccount,
        login: &mut dyn SessionLogin,
    ) -> Result<CallbackOutcome, StoreError> {
        let Some(user) = self.users.find_user_by_id(account.user_id).await? else {
            tracing::warn!(
                connected_account_id = %account.id,
                user_id = %account.user_id,
                "Connected account has no owning user"
            );
            return Ok(CallbackOutcome::rejected(
                Rejection::NotFound,
                RedirectTarget::Login,
                NoticeStyle::FieldError,
                provider,
                message(MessageKey::AccountNotFound, provider),
            ));
        };

        let account = self
            .updater
            .update_connected_account(&user, &account, provider, identity)
            .await?;
        self.updater
            .set_current_connected_account(&user, &account)
            .await?;

        self.login(&user, false, login).await
    }

    async fn login(
        &self,
        user: &User,
        created_user: bool,
        login: &mut dyn SessionLogin,
    ) -> Result<CallbackOutcome, StoreError> {
        let response = login.login(user, self.features.remember_session).await?;
        Ok(CallbackOutcome::logged_in(response, created_user))
    }
}
