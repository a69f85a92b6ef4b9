//! # Server Configuration
//!
//! Application state, router and OpenAPI document for the accountlink service.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::FromRef,
    middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::crypto::CryptoKey;
use crate::handlers;
use crate::providers::ProviderRegistry;
use crate::repositories::{ConnectedAccountRepository, SessionRepository, UserRepository};
use crate::resolver::CallbackResolver;
use crate::session::SessionStore;
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub registry: Arc<ProviderRegistry>,
    pub resolver: CallbackResolver,
    pub users: UserRepository,
    pub accounts: ConnectedAccountRepository,
    pub sessions: SessionStore,
}

impl AppState {
    /// Wire repositories, sessions and the callback resolver over `db`
    pub fn new(
        config: AppConfig,
        db: DatabaseConnection,
        registry: ProviderRegistry,
    ) -> anyhow::Result<Self> {
        let key_bytes = config
            .crypto_key
            .clone()
            .context("crypto key is required to store provider tokens")?;
        let crypto_key = CryptoKey::new(key_bytes)?;

        let shared_db = Arc::new(db.clone());
        let users = UserRepository::new(shared_db.clone());
        let accounts = ConnectedAccountRepository::new(shared_db.clone(), crypto_key);
        let sessions = SessionStore::new(SessionRepository::new(shared_db), &config);

        let resolver = CallbackResolver::new(
            Arc::new(users.clone()),
            Arc::new(accounts.clone()),
            Arc::new(accounts.clone()),
            config.features,
        );

        Ok(Self {
            config: Arc::new(config),
            db,
            registry: Arc::new(registry),
            resolver,
            users,
            accounts,
            sessions,
        })
    }
}

impl FromRef<AppState> for SessionStore {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.sessions.clone()
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/oauth/{provider}", get(handlers::oauth::redirect_to_provider))
        .route(
            "/oauth/{provider}/callback",
            get(handlers::oauth::handle_provider_callback),
        )
        .route("/session", get(handlers::session::current_session))
        .route("/logout", post(handlers::session::logout))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(telemetry::trace_id_middleware))
                .layer(TraceLayer::new_for_http()),
        )
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config
        .bind_addr()
        .with_context(|| format!("invalid server address '{}'", config.api_bind_addr))?;

    let registry = ProviderRegistry::from_config(&config)?;
    let profile = config.profile.clone();
    let state = AppState::new(config, db, registry)?;

    crate::db::health_check(&state.db).await?;

    match state.sessions.purge_expired().await {
        Ok(purged) if purged > 0 => tracing::info!(purged, "Removed expired sessions"),
        Ok(_) => {}
        Err(error) => tracing::warn!(%error, "Failed to purge expired sessions"),
    }

    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::oauth::redirect_to_provider,
        crate::handlers::oauth::handle_provider_callback,
        crate::handlers::session::current_session,
        crate::handlers::session::logout,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::session::SessionResponse,
            crate::handlers::session::SessionUser,
            crate::handlers::session::LinkedAccount,
            crate::session::Flash,
            crate::session::Banner,
            crate::session::BannerStyle,
        )
    ),
    tags(
        (name = "root", description = "Service information"),
        (name = "oauth", description = "Provider redirects and callbacks"),
        (name = "session", description = "Session state and logout"),
    ),
    info(
        title = "accountlink API",
        description = "Social login: links local accounts to OAuth identity providers",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
