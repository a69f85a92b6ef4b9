//! # Repository Layer
//!
//! SeaORM-backed stores for users, connected accounts and sessions. The
//! user and connected-account repositories implement the resolver's
//! collaborator traits.

use sea_orm::DbErr;
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::error::is_unique_violation;

pub mod connected_account;
pub mod session;
pub mod user;

pub use connected_account::ConnectedAccountRepository;
pub use session::SessionRepository;
pub use user::UserRepository;

/// Storage failures seen by the resolver and handlers
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write (`what` names the record)
    #[error("{0} already exists")]
    Conflict(&'static str),
    /// A required attribute was missing from the input
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("token encryption error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("session payload error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Conflict tag for a duplicate `(provider, provider_id)` link
pub const CONNECTED_ACCOUNT: &str = "connected account";
/// Conflict tag for a duplicate user email
pub const USER: &str = "user";

/// Canonical form of an email address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl StoreError {
    /// Classify a write error, turning unique violations into [`StoreError::Conflict`]
    pub fn from_write(error: DbErr, what: &'static str) -> Self {
        if is_unique_violation(&error) {
            tracing::debug!(?error, record = what, "Unique constraint violation");
            StoreError::Conflict(what)
        } else {
            StoreError::Database(error)
        }
    }
}
