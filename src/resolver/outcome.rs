//! Tagged callback outcomes.
//!
//! Every path through the resolver ends in a [`CallbackOutcome`]: where to
//! redirect, what to tell the user, and which kind of result it was.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Application destination a callback redirects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RedirectTarget {
    Home,
    Login,
    Register,
    Profile,
}

/// Message catalog keys, rendered with `:Provider` / `:description` substitutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageKey {
    ProviderError,
    ProviderUnavailable,
    InvalidState,
    AlreadyLinkedToOther,
    AlreadyLinkedToYou,
    Connected,
    AlreadyRegistered,
    MissingEmail,
    EmailTaken,
    AccountNotFound,
}

impl MessageKey {
    /// English template for this key
    pub fn template(self) -> &'static str {
        match self {
            MessageKey::ProviderError => ":description",
            MessageKey::ProviderUnavailable => {
                "We could not complete the :Provider sign in. Please try again."
            }
            MessageKey::InvalidState => {
                "Your :Provider sign in request has expired or is invalid. Please try again."
            }
            MessageKey::AlreadyLinkedToOther => {
                "This :Provider sign in account is already associated with another user. Please log in with that user or connect a different :Provider account."
            }
            MessageKey::AlreadyLinkedToYou => {
                "This :Provider sign in account is already associated with your user."
            }
            MessageKey::Connected => "You have successfully connected :Provider to your account.",
            MessageKey::AlreadyRegistered => {
                "An account with that :Provider sign in already exists, please login."
            }
            MessageKey::MissingEmail => {
                "No email address is associated with this :Provider account. Please try a different account."
            }
            MessageKey::EmailTaken => {
                "An account with that email address already exists. Please login to connect your :Provider account."
            }
            MessageKey::AccountNotFound => {
                "An account with this :Provider sign in was not found. Please register or try a different sign in method."
            }
        }
    }
}

/// A message key plus its placeholder substitutions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub key: MessageKey,
    pub replacements: Vec<(&'static str, String)>,
}

impl Message {
    pub fn new(key: MessageKey) -> Self {
        Self {
            key,
            replacements: Vec::new(),
        }
    }

    pub fn with(mut self, placeholder: &'static str, value: impl Into<String>) -> Self {
        self.replacements.push((placeholder, value.into()));
        self
    }

    /// Render the template in a single pass. At each `:` the longest matching
    /// placeholder wins, and substituted values are never rescanned.
    pub fn render(&self) -> String {
        let template = self.key.template();
        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(colon) = rest.find(':') {
            rendered.push_str(&rest[..colon]);
            let after = &rest[colon + 1..];
            let matched = self
                .replacements
                .iter()
                .filter(|(placeholder, _)| after.starts_with(placeholder))
                .max_by_key(|(placeholder, _)| placeholder.len());

            match matched {
                Some((placeholder, value)) => {
                    rendered.push_str(value);
                    rest = &after[placeholder.len()..];
                }
                None => {
                    rendered.push(':');
                    rest = after;
                }
            }
        }
        rendered.push_str(rest);
        rendered
    }
}

/// How a message is delivered to the next page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoticeStyle {
    /// Success banner
    Banner,
    /// Error banner
    DangerBanner,
    /// Form error keyed by provider name
    FieldError,
}

/// User-facing notice attached to a redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub style: NoticeStyle,
    /// Error-bag key for [`NoticeStyle::FieldError`] (the provider name)
    pub field: String,
    pub message: Message,
}

/// Rejection kinds recovered at the resolver boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("provider returned an error: {description}")]
    ProviderError { description: String },
    #[error("OAuth state mismatch")]
    InvalidState,
    #[error("provider account is linked to another user")]
    AlreadyLinkedConflict,
    #[error("email address is already registered")]
    DuplicateEmail,
    #[error("provider supplied no email address")]
    MissingEmail,
    #[error("no account is linked to this provider identity")]
    NotFound,
    #[error("an account for this email already exists; login instead")]
    AlreadyRegistered,
}

/// Successful login performed by a [`super::SessionLogin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub remember: bool,
}

/// What happened during the callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeKind {
    /// A user was logged in; `created_user` is set when the account is new
    LoggedIn {
        response: LoginResponse,
        created_user: bool,
    },
    /// A provider identity was linked to the authenticated user
    Linked { connected_account_id: Uuid },
    /// The identity was already linked to the authenticated user
    AlreadyLinked,
    /// A non-fatal provider error was reported to an authenticated user
    ProviderErrorReported,
    Rejected(Rejection),
}

/// Result of resolving one provider callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub kind: OutcomeKind,
    pub redirect: RedirectTarget,
    pub notice: Option<Notice>,
}

impl CallbackOutcome {
    pub(crate) fn logged_in(response: LoginResponse, created_user: bool) -> Self {
        Self {
            kind: OutcomeKind::LoggedIn {
                response,
                created_user,
            },
            redirect: RedirectTarget::Home,
            notice: None,
        }
    }

    pub(crate) fn rejected(
        rejection: Rejection,
        redirect: RedirectTarget,
        style: NoticeStyle,
        provider: &str,
        message: Message,
    ) -> Self {
        Self {
            kind: OutcomeKind::Rejected(rejection),
            redirect,
            notice: Some(Notice {
                style,
                field: provider.to_string(),
                message,
            }),
        }
    }

    /// Returns the rejection, if this outcome is one
    pub fn rejection(&self) -> Option<&Rejection> {
        match &self.kind {
            OutcomeKind::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    pub fn is_login(&self) -> bool {
        matches!(self.kind, OutcomeKind::LoggedIn { .. })
    }

    /// Label used in structured logs
    pub fn label(&self) -> &'static str {
        match &self.kind {
            OutcomeKind::LoggedIn {
                created_user: true, ..
            } => "registered",
            OutcomeKind::LoggedIn { .. } => "logged_in",
            OutcomeKind::Linked { .. } => "linked",
            OutcomeKind::AlreadyLinked => "already_linked",
            OutcomeKind::ProviderErrorReported => "provider_error",
            OutcomeKind::Rejected(Rejection::ProviderError { .. }) => "rejected_provider_error",
            OutcomeKind::Rejected(Rejection::InvalidState) => "rejected_invalid_state",
            OutcomeKind::Rejected(Rejection::AlreadyLinkedConflict) => "rejected_conflict",
            OutcomeKind::Rejected(Rejection::DuplicateEmail) => "rejected_duplicate_email",
            OutcomeKind::Rejected(Rejection::MissingEmail) => "rejected_missing_email",
            OutcomeKind::Rejected(Rejection::NotFound) => "rejected_not_found",
            OutcomeKind::Rejected(Rejection::AlreadyRegistered) => "rejected_already_registered",
        }
    }
}
