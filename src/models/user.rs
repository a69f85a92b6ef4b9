//! User entity model
//!
//! Local accounts that provider identities are linked to.

use chrono::{DateTime, Utc};
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local user account
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Primary key UUID
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Email address (unique)
    #[sea_orm(unique)]
    pub email: String,

    /// When the email address was verified, if ever
    pub email_verified_at: Option<DateTime<Utc>>,

    /// Connected account used for the most recent provider login
    pub current_connected_account_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::connected_account::Entity")]
    ConnectedAccounts,
}

impl Related<super::connected_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConnectedAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
