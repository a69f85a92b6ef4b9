//! # Session Model
//!
//! Server-side session rows, keyed by the SHA-256 digest of the cookie value.

use chrono::{DateTime, Utc};
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Hex-encoded SHA-256 of the session cookie value
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Authenticated user, duplicated out of the payload for lookups
    pub user_id: Option<Uuid>,

    /// Serialized session data
    #[sea_orm(column_type = "Json")]
    pub payload: JsonValue,

    pub expires_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
