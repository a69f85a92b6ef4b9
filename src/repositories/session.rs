//! Session repository
//!
//! Rows are keyed by the SHA-256 digest of the cookie token; the raw token
//! never touches the database.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use super::StoreError;
use crate::models::session::{self, Entity as Session};

/// Hex-encoded SHA-256 of a session cookie token
pub fn session_id_for(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Repository for session rows
#[derive(Debug, Clone)]
pub struct SessionRepository {
    db: Arc<DatabaseConnection>,
}

impl SessionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Loads an unexpired session for `token`; expired rows are removed
    pub async fn find_active(&self, token: &str) -> Result<Option<session::Model>, StoreError> {
        let Some(record) = Session::find_by_id(session_id_for(token))
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };

        if record.expires_at <= Utc::now() {
            Session::delete_by_id(record.id).exec(&*self.db).await?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Inserts or replaces the row for `token`
    pub async fn upsert(
        &self,
        token: &str,
        user_id: Option<Uuid>,
        payload: serde_json::Value,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let row = session::ActiveModel {
            id: Set(session_id_for(token)),
            user_id: Set(user_id),
            payload: Set(payload),
            expires_at: Set(expires_at),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Session::insert(row)
            .on_conflict(
                OnConflict::column(session::Column::Id)
                    .update_columns([
                        session::Column::UserId,
                        session::Column::Payload,
                        session::Column::ExpiresAt,
                        session::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        Ok(())
    }

    pub async fn delete(&self, token: &str) -> Result<(), StoreError> {
        Session::delete_by_id(session_id_for(token))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    /// Removes every expired row, returning how many were deleted
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = Session::delete_many()
            .filter(session::Column::ExpiresAt.lte(Utc::now()))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_is_sha256_hex() {
        let id = session_id_for("token");
        assert_eq!(id.len(), 64);
        assert_eq!(id, session_id_for("token"));
        assert_ne!(id, session_id_for("other"));
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
