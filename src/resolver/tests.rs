//! Decision-table tests for [`CallbackResolver`] over in-memory collaborators.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::*;
use crate::repositories::USER;

#[derive(Default)]
struct Store {
    users: Vec<User>,
    accounts: Vec<ConnectedAccount>,
    writes: Vec<&'static str>,
}

/// In-memory users and links. `link_conflict` / `user_conflict` make the
/// corresponding create fail as if another request won the race.
#[derive(Default)]
struct FakeStore {
    inner: Mutex<Store>,
    link_conflict: bool,
    user_conflict: bool,
}

impl FakeStore {
    fn add_user(&self, email: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: email.to_string(),
            email: email.to_string(),
            email_verified_at: None,
            current_connected_account_id: None,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().users.push(user.clone());
        user
    }

    fn add_link(&self, user: &User, provider: &str, provider_id: &str) -> ConnectedAccount {
        let account = account_for(user.id, provider, provider_id);
        self.inner.lock().unwrap().accounts.push(account.clone());
        account
    }

    fn writes(&self) -> Vec<&'static str> {
        self.inner.lock().unwrap().writes.clone()
    }

    fn user_count(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }

    fn account_count(&self) -> usize {
        self.inner.lock().unwrap().accounts.len()
    }

    fn user(&self, id: Uuid) -> User {
        self.inner
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|user| user.id == id)
            .cloned()
            .unwrap()
    }
}

fn account_for(user_id: Uuid, provider: &str, provider_id: &str) -> ConnectedAccount {
    let now = Utc::now();
    ConnectedAccount {
        id: Uuid::new_v4(),
        user_id,
        provider: provider.to_string(),
        provider_id: provider_id.to_string(),
        name: None,
        nickname: None,
        email: None,
        avatar_path: None,
        token_ciphertext: None,
        refresh_token_ciphertext: None,
        expires_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl UserLookup for FakeStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let store = self.inner.lock().unwrap();
        Ok(store.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let store = self.inner.lock().unwrap();
        Ok(store.users.iter().find(|user| user.email == email).cloned())
    }
}

#[async_trait]
impl AccountLinker for FakeStore {
    async fn find_connected_account(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<ConnectedAccount>, StoreError> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .accounts
            .iter()
            .find(|account| account.provider == provider && account.provider_id == provider_id)
            .cloned())
    }

    async fn create_connected_account(
        &self,
        user: &User,
        provider: &str,
        identity: &ProviderIdentity,
    ) -> Result<ConnectedAccount, StoreError> {
        if self.link_conflict {
            return Err(StoreError::Conflict(CONNECTED_ACCOUNT));
        }
        let mut store = self.inner.lock().unwrap();
        if store
            .accounts
            .iter()
            .any(|account| account.provider == provider && account.provider_id == identity.id)
        {
            return Err(StoreError::Conflict(CONNECTED_ACCOUNT));
        }
        let account = account_for(user.id, provider, &identity.id);
        store.accounts.push(account.clone());
        store.writes.push("create_connected_account");
        Ok(account)
    }

    async fn create_user_from_provider(
        &self,
        provider: &str,
        identity: &ProviderIdentity,
    ) -> Result<User, StoreError> {
        if self.user_conflict {
            return Err(StoreError::Conflict(USER));
        }
        if self.link_conflict {
            return Err(StoreError::Conflict(CONNECTED_ACCOUNT));
        }
        let email = identity.email().ok_or(StoreError::MissingField("email"))?;
        let now = Utc::now();
        let mut user = User {
            id: Uuid::new_v4(),
            name: identity.display_name(),
            email: email.to_string(),
            email_verified_at: None,
            current_connected_account_id: None,
            created_at: now,
            updated_at: now,
        };
        let account = account_for(user.id, provider, &identity.id);
        user.current_connected_account_id = Some(account.id);

        let mut store = self.inner.lock().unwrap();
        store.users.push(user.clone());
        store.accounts.push(account);
        store.writes.push("create_user_from_provider");
        Ok(user)
    }
}

#[async_trait]
impl AccountUpdater for FakeStore {
    async fn update_connected_account(
        &self,
        _user: &User,
        account: &ConnectedAccount,
        _provider: &str,
        identity: &ProviderIdentity,
    ) -> Result<ConnectedAccount, StoreError> {
        let mut store = self.inner.lock().unwrap();
        let stored = store
            .accounts
            .iter_mut()
            .find(|stored| stored.id == account.id)
            .ok_or(StoreError::MissingField("connected account"))?;
        stored.name = identity.name.clone();
        stored.email = identity.email.clone();
        let updated = stored.clone();
        store.writes.push("update_connected_account");
        Ok(updated)
    }

    async fn set_current_connected_account(
        &self,
        user: &User,
        account: &ConnectedAccount,
    ) -> Result<(), StoreError> {
        let mut store = self.inner.lock().unwrap();
        if let Some(stored) = store.users.iter_mut().find(|stored| stored.id == user.id) {
            stored.current_connected_account_id = Some(account.id);
        }
        store.writes.push("set_current_connected_account");
        Ok(())
    }
}

#[derive(Default)]
struct RecordingLogin {
    logins: Vec<(Uuid, bool)>,
}

#[async_trait]
impl SessionLogin for RecordingLogin {
    async fn login(&mut self, user: &User, remember: bool) -> Result<LoginResponse, StoreError> {
        self.logins.push((user.id, remember));
        Ok(LoginResponse {
            user_id: user.id,
            remember,
        })
    }
}

fn resolver(store: &Arc<FakeStore>, features: Features) -> CallbackResolver {
    CallbackResolver::new(store.clone(), store.clone(), store.clone(), features)
}

fn features(create_account_on_first_login: bool, login_on_registration: bool) -> Features {
    Features {
        registration: true,
        create_account_on_first_login,
        login_on_registration,
        remember_session: true,
    }
}

fn github_identity(id: &str, email: Option<&str>) -> ProviderResult {
    let identity = ProviderIdentity::new("github", id).with_name("Octo Cat");
    ProviderResult::Identity(match email {
        Some(email) => identity.with_email(email),
        None => identity,
    })
}

fn notice_text(outcome: &CallbackOutcome) -> String {
    outcome
        .notice
        .as_ref()
        .map(|notice| notice.message.render())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_unlinked_guest_without_auto_create_is_not_found() {
    let store = Arc::new(FakeStore::default());
    let mut login = RecordingLogin::default();

    for provider in ["github", "google", "gitlab"] {
        let identity = ProviderResult::Identity(
            ProviderIdentity::new(provider, "42").with_email("new@example.com"),
        );
        let outcome = resolver(&store, features(false, false))
            .resolve_callback(provider, identity, &SessionContext::guest(), &mut login)
            .await
            .unwrap();

        assert_eq!(outcome.rejection(), Some(&Rejection::NotFound));
        assert_eq!(outcome.redirect, RedirectTarget::Login);
        let notice = outcome.notice.as_ref().unwrap();
        assert_eq!(notice.style, NoticeStyle::FieldError);
        assert_eq!(notice.field, provider);
    }

    assert_eq!(store.user_count(), 0);
    assert!(store.writes().is_empty());
    assert!(login.logins.is_empty());
}

#[tokio::test]
async fn test_authenticated_link_owned_by_other_user_conflicts_without_writes() {
    let store = Arc::new(FakeStore::default());
    let owner = store.add_user("owner@example.com");
    let current = store.add_user("current@example.com");
    store.add_link(&owner, "github", "42");
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(true, true))
        .resolve_callback(
            "github",
            github_identity("42", Some("current@example.com")),
            &SessionContext::authenticated(current),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rejection(), Some(&Rejection::AlreadyLinkedConflict));
    assert_eq!(outcome.redirect, RedirectTarget::Profile);
    assert_eq!(outcome.notice.as_ref().unwrap().style, NoticeStyle::DangerBanner);
    assert!(notice_text(&outcome).contains("already associated with another user"));
    assert!(store.writes().is_empty());
    assert!(login.logins.is_empty());
}

#[tokio::test]
async fn test_authenticated_unlinked_identity_creates_one_link() {
    let store = Arc::new(FakeStore::default());
    let user = store.add_user("me@example.com");
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(true, false))
        .resolve_callback(
            "github",
            github_identity("42", Some("other@example.com")),
            &SessionContext::authenticated(user.clone()),
            &mut login,
        )
        .await
        .unwrap();

    assert!(matches!(outcome.kind, OutcomeKind::Linked { .. }));
    assert_eq!(outcome.redirect, RedirectTarget::Profile);
    assert_eq!(outcome.notice.as_ref().unwrap().style, NoticeStyle::Banner);
    assert_eq!(
        notice_text(&outcome),
        "You have successfully connected GitHub to your account."
    );
    assert_eq!(store.writes(), vec!["create_connected_account"]);
    assert_eq!(store.user_count(), 1);
    assert_eq!(store.account_count(), 1);
    assert!(login.logins.is_empty());
}

#[tokio::test]
async fn test_authenticated_link_is_idempotent() {
    let store = Arc::new(FakeStore::default());
    let user = store.add_user("me@example.com");
    let resolver = resolver(&store, features(false, false));
    let session = SessionContext::authenticated(user);
    let mut login = RecordingLogin::default();

    let first = resolver
        .resolve_callback("github", github_identity("42", None), &session, &mut login)
        .await
        .unwrap();
    let second = resolver
        .resolve_callback("github", github_identity("42", None), &session, &mut login)
        .await
        .unwrap();

    assert!(matches!(first.kind, OutcomeKind::Linked { .. }));
    assert_eq!(second.kind, OutcomeKind::AlreadyLinked);
    assert_eq!(second.redirect, RedirectTarget::Profile);
    assert!(notice_text(&second).contains("already associated with your user"));
    assert_eq!(store.account_count(), 1);
}

#[tokio::test]
async fn test_authenticated_session_wins_over_registration_marker() {
    let store = Arc::new(FakeStore::default());
    let user = store.add_user("me@example.com");
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(true, true))
        .resolve_callback(
            "github",
            github_identity("42", Some("fresh@example.com")),
            &SessionContext::authenticated(user.clone()).from_registration(),
            &mut login,
        )
        .await
        .unwrap();

    assert!(matches!(outcome.kind, OutcomeKind::Linked { .. }));
    assert_eq!(store.writes(), vec!["create_connected_account"]);
    assert_eq!(store.user_count(), 1);
    assert!(login.logins.is_empty());
}

#[tokio::test]
async fn test_guest_with_auto_create_registers_and_logs_in() {
    let store = Arc::new(FakeStore::default());
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(true, false))
        .resolve_callback(
            "github",
            github_identity("42", Some("octo@example.com")),
            &SessionContext::guest(),
            &mut login,
        )
        .await
        .unwrap();

    let OutcomeKind::LoggedIn {
        response,
        created_user,
    } = &outcome.kind
    else {
        panic!("expected a login, got {:?}", outcome.kind);
    };
    assert!(*created_user);
    assert_eq!(outcome.redirect, RedirectTarget::Home);
    assert!(outcome.notice.is_none());
    assert_eq!(store.writes(), vec!["create_user_from_provider"]);
    assert_eq!(login.logins, vec![(response.user_id, true)]);

    let user = store.user(response.user_id);
    assert_eq!(user.email, "octo@example.com");
    assert_eq!(user.name, "Octo Cat");
    assert!(user.current_connected_account_id.is_some());
}

#[tokio::test]
async fn test_guest_with_existing_link_updates_and_logs_in() {
    let store = Arc::new(FakeStore::default());
    let user = store.add_user("octo@example.com");
    let account = store.add_link(&user, "github", "42");
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(true, false))
        .resolve_callback(
            "github",
            github_identity("42", Some("octo@example.com")),
            &SessionContext::guest(),
            &mut login,
        )
        .await
        .unwrap();

    assert!(outcome.is_login());
    assert_eq!(outcome.label(), "logged_in");
    assert_eq!(
        store.writes(),
        vec!["update_connected_account", "set_current_connected_account"]
    );
    assert_eq!(store.user_count(), 1);
    assert_eq!(login.logins, vec![(user.id, true)]);
    assert_eq!(
        store.user(user.id).current_connected_account_id,
        Some(account.id)
    );
}

#[tokio::test]
async fn test_remember_flag_follows_features() {
    let store = Arc::new(FakeStore::default());
    let user = store.add_user("octo@example.com");
    store.add_link(&user, "github", "42");
    let mut login = RecordingLogin::default();
    let features = Features {
        remember_session: false,
        ..features(false, false)
    };

    resolver(&store, features)
        .resolve_callback(
            "github",
            github_identity("42", None),
            &SessionContext::guest(),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(login.logins, vec![(user.id, false)]);
}

#[tokio::test]
async fn test_link_without_owner_is_not_found() {
    let store = Arc::new(FakeStore::default());
    store
        .inner
        .lock()
        .unwrap()
        .accounts
        .push(account_for(Uuid::new_v4(), "github", "42"));
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(true, false))
        .resolve_callback(
            "github",
            github_identity("42", None),
            &SessionContext::guest(),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rejection(), Some(&Rejection::NotFound));
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_auto_create_rejects_registered_email() {
    let store = Arc::new(FakeStore::default());
    store.add_user("octo@example.com");
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(true, false))
        .resolve_callback(
            "github",
            github_identity("42", Some("octo@example.com")),
            &SessionContext::guest(),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rejection(), Some(&Rejection::DuplicateEmail));
    assert_eq!(outcome.redirect, RedirectTarget::Login);
    assert!(notice_text(&outcome).contains("connect your GitHub account"));
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_auto_create_requires_email() {
    let store = Arc::new(FakeStore::default());
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(true, false))
        .resolve_callback(
            "github",
            github_identity("42", Some("   ")),
            &SessionContext::guest(),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rejection(), Some(&Rejection::MissingEmail));
    assert_eq!(outcome.redirect, RedirectTarget::Login);
    assert_eq!(store.user_count(), 0);
}

#[tokio::test]
async fn test_provider_error_for_authenticated_user_is_a_banner() {
    let store = Arc::new(FakeStore::default());
    let user = store.add_user("me@example.com");
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(true, true))
        .resolve_callback(
            "github",
            ProviderResult::Error {
                description: "The user has denied your application access.".to_string(),
            },
            &SessionContext::authenticated(user),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.kind, OutcomeKind::ProviderErrorReported);
    assert_eq!(outcome.redirect, RedirectTarget::Home);
    assert_eq!(outcome.notice.as_ref().unwrap().style, NoticeStyle::DangerBanner);
    assert_eq!(
        notice_text(&outcome),
        "The user has denied your application access."
    );
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_provider_error_for_guest_redirects_to_register() {
    let store = Arc::new(FakeStore::default());
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(true, true))
        .resolve_callback(
            "google",
            ProviderResult::Error {
                description: "access_denied".to_string(),
            },
            &SessionContext::guest(),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(
        outcome.rejection(),
        Some(&Rejection::ProviderError {
            description: "access_denied".to_string()
        })
    );
    assert_eq!(outcome.redirect, RedirectTarget::Register);
    let notice = outcome.notice.as_ref().unwrap();
    assert_eq!(notice.style, NoticeStyle::FieldError);
    assert_eq!(notice.field, "google");
    assert!(store.writes().is_empty());
    assert!(login.logins.is_empty());
}

#[test]
fn test_invalid_state_uses_default_handler() {
    let store = Arc::new(FakeStore::default());

    let outcome = resolver(&store, Features::default())
        .resolve_invalid_state("github", &SessionContext::guest());

    assert_eq!(outcome.rejection(), Some(&Rejection::InvalidState));
    assert_eq!(outcome.redirect, RedirectTarget::Login);
    assert!(notice_text(&outcome).contains("GitHub sign in request"));
    assert!(store.writes().is_empty());
}

#[test]
fn test_invalid_state_handler_can_be_replaced() {
    struct BackHome;

    impl InvalidStateHandler for BackHome {
        fn handle(&self, provider: &str, _session: &SessionContext) -> CallbackOutcome {
            CallbackOutcome::rejected(
                Rejection::InvalidState,
                RedirectTarget::Home,
                NoticeStyle::DangerBanner,
                provider,
                Message::new(MessageKey::InvalidState).with("Provider", provider),
            )
        }
    }

    let store = Arc::new(FakeStore::default());
    let outcome = resolver(&store, Features::default())
        .with_invalid_state_handler(Arc::new(BackHome))
        .resolve_invalid_state("gitlab", &SessionContext::guest());

    assert_eq!(outcome.redirect, RedirectTarget::Home);
}

#[tokio::test]
async fn test_link_race_reports_conflict() {
    let store = Arc::new(FakeStore {
        link_conflict: true,
        ..FakeStore::default()
    });
    let user = store.add_user("me@example.com");
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(false, false))
        .resolve_callback(
            "github",
            github_identity("42", None),
            &SessionContext::authenticated(user),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rejection(), Some(&Rejection::AlreadyLinkedConflict));
    assert_eq!(store.account_count(), 0);
}

#[tokio::test]
async fn test_create_user_race_reports_duplicate_email() {
    let store = Arc::new(FakeStore {
        user_conflict: true,
        ..FakeStore::default()
    });
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(true, false))
        .resolve_callback(
            "github",
            github_identity("42", Some("octo@example.com")),
            &SessionContext::guest(),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rejection(), Some(&Rejection::DuplicateEmail));
    assert!(login.logins.is_empty());
}

#[tokio::test]
async fn test_create_user_link_race_reports_already_linked() {
    let store = Arc::new(FakeStore {
        link_conflict: true,
        ..FakeStore::default()
    });
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(true, false))
        .resolve_callback(
            "github",
            github_identity("42", Some("octo@example.com")),
            &SessionContext::guest(),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rejection(), Some(&Rejection::AlreadyLinkedConflict));
    assert_eq!(outcome.redirect, RedirectTarget::Login);
    assert!(notice_text(&outcome).contains("already associated with another user"));
    assert_eq!(store.user_count(), 0);
    assert!(login.logins.is_empty());
}

#[tokio::test]
async fn test_login_on_registration_link_race_reports_already_linked() {
    let store = Arc::new(FakeStore {
        link_conflict: true,
        ..FakeStore::default()
    });
    store.add_user("octo@example.com");
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(false, true))
        .resolve_callback(
            "github",
            github_identity("42", Some("octo@example.com")),
            &SessionContext::guest().from_registration(),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rejection(), Some(&Rejection::AlreadyLinkedConflict));
    assert_eq!(outcome.redirect, RedirectTarget::Login);
    assert!(store.writes().is_empty());
    assert!(login.logins.is_empty());
}

#[tokio::test]
async fn test_registration_without_email_is_rejected() {
    let store = Arc::new(FakeStore::default());
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(false, false))
        .resolve_callback(
            "github",
            github_identity("42", None),
            &SessionContext::guest().from_registration(),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rejection(), Some(&Rejection::MissingEmail));
    assert_eq!(outcome.redirect, RedirectTarget::Register);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_registration_creates_user_even_without_auto_create() {
    let store = Arc::new(FakeStore::default());
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(false, false))
        .resolve_callback(
            "github",
            github_identity("42", Some("octo@example.com")),
            &SessionContext::guest().from_registration(),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.label(), "registered");
    assert_eq!(store.writes(), vec!["create_user_from_provider"]);
    assert_eq!(login.logins.len(), 1);
}

#[tokio::test]
async fn test_registration_with_known_email_asks_to_login() {
    let store = Arc::new(FakeStore::default());
    store.add_user("octo@example.com");
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(false, false))
        .resolve_callback(
            "github",
            github_identity("42", Some("octo@example.com")),
            &SessionContext::guest().from_registration(),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rejection(), Some(&Rejection::AlreadyRegistered));
    assert_eq!(outcome.redirect, RedirectTarget::Login);
    assert!(store.writes().is_empty());
    assert!(login.logins.is_empty());
}

#[tokio::test]
async fn test_login_on_registration_links_and_logs_in() {
    let store = Arc::new(FakeStore::default());
    let user = store.add_user("octo@example.com");
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(false, true))
        .resolve_callback(
            "github",
            github_identity("42", Some("octo@example.com")),
            &SessionContext::guest().from_registration(),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.label(), "logged_in");
    assert_eq!(
        store.writes(),
        vec!["create_connected_account", "set_current_connected_account"]
    );
    assert_eq!(store.user_count(), 1);
    assert_eq!(login.logins, vec![(user.id, true)]);
}

#[tokio::test]
async fn test_registration_marker_with_existing_link_logs_in() {
    let store = Arc::new(FakeStore::default());
    let user = store.add_user("octo@example.com");
    store.add_link(&user, "github", "42");
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(false, false))
        .resolve_callback(
            "github",
            github_identity("42", Some("octo@example.com")),
            &SessionContext::guest().from_registration(),
            &mut login,
        )
        .await
        .unwrap();

    assert!(outcome.is_login());
    assert_eq!(store.account_count(), 1);
}

#[tokio::test]
async fn test_registration_disabled_falls_through_to_login() {
    let store = Arc::new(FakeStore::default());
    let mut login = RecordingLogin::default();
    let features = Features {
        registration: false,
        ..features(false, false)
    };

    let outcome = resolver(&store, features)
        .resolve_callback(
            "github",
            github_identity("42", Some("octo@example.com")),
            &SessionContext::guest().from_registration(),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rejection(), Some(&Rejection::NotFound));
    assert_eq!(store.user_count(), 0);
}

#[tokio::test]
async fn test_invalid_state_result_routes_to_handler() {
    let store = Arc::new(FakeStore::default());
    let user = store.add_user("me@example.com");
    let mut login = RecordingLogin::default();

    let outcome = resolver(&store, features(true, true))
        .resolve_callback(
            "github",
            ProviderResult::InvalidState,
            &SessionContext::authenticated(user),
            &mut login,
        )
        .await
        .unwrap();

    assert_eq!(outcome.rejection(), Some(&Rejection::InvalidState));
    assert_eq!(outcome.label(), "rejected_invalid_state");
    assert!(store.writes().is_empty());
    assert!(login.logins.is_empty());
}
