//! User repository
//!
//! Lookups of local users by id and email address.

use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use uuid::Uuid;

use super::{StoreError, normalize_email};
use crate::models::user::{self, Entity as User};
use crate::resolver::UserLookup;

/// Repository for user database operations
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Finds a user by primary key
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<user::Model>, StoreError> {
        Ok(User::find_by_id(id).one(&*self.db).await?)
    }

    /// Finds a user by email address, ignoring case and surrounding whitespace
    pub async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, StoreError> {
        Ok(User::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(user::Column::Email)))
                    .eq(normalize_email(email)),
            )
            .one(&*self.db)
            .await?)
    }
}

#[async_trait]
impl UserLookup for UserRepository {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<user::Model>, StoreError> {
        self.find_by_id(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<user::Model>, StoreError> {
        self.find_by_email(email).await
    }
}
