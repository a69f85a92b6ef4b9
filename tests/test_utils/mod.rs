//! Test utilities for database and application setup.
//!
//! Provides an in-memory SQLite database with migrations applied, a valid
//! configuration and helpers for seeding users.

use accountlink::config::AppConfig;
use accountlink::crypto::CryptoKey;
use accountlink::models::user;
use anyhow::Result;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use uuid::Uuid;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// A key that satisfies the 32-byte AES-256 requirement.
#[allow(dead_code)]
pub fn test_crypto_key() -> CryptoKey {
    CryptoKey::new(vec![7u8; 32]).expect("valid test key")
}

/// Configuration that passes validation, with no providers enabled.
#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    AppConfig {
        crypto_key: Some(vec![7u8; 32]),
        ..AppConfig::default()
    }
}

/// Inserts a local user directly.
#[allow(dead_code)]
pub async fn insert_user(db: &DatabaseConnection, email: &str) -> Result<user::Model> {
    let now = Utc::now();
    let user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(email.split('@').next().unwrap_or(email).to_string()),
        email: Set(email.to_string()),
        email_verified_at: Set(None),
        current_connected_account_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(user)
}
