//! Connected account repository
//!
//! Links between users and provider identities. Provider tokens are
//! encrypted before they reach the database; new users created from a
//! provider identity are written together with their first link in one
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{CONNECTED_ACCOUNT, StoreError, USER, normalize_email};
use crate::crypto::{CryptoKey, decrypt_account_tokens, encrypt_account_tokens};
use crate::models::connected_account::{self, Entity as ConnectedAccount};
use crate::models::user;
use crate::resolver::{AccountLinker, AccountUpdater, ProviderIdentity};

/// Repository for connected account database operations
#[derive(Debug, Clone)]
pub struct ConnectedAccountRepository {
    db: Arc<DatabaseConnection>,
    crypto_key: CryptoKey,
}

impl ConnectedAccountRepository {
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    /// Finds the link for a `(provider, provider_id)` pair
    pub async fn find_by_provider_id(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<connected_account::Model>, StoreError> {
        Ok(ConnectedAccount::find()
            .filter(connected_account::Column::Provider.eq(provider))
            .filter(connected_account::Column::ProviderId.eq(provider_id))
            .one(&*self.db)
            .await?)
    }

    /// Lists a user's links, oldest first
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<connected_account::Model>, StoreError> {
        Ok(ConnectedAccount::find()
            .filter(connected_account::Column::UserId.eq(user_id))
            .order_by_asc(connected_account::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Decrypts the stored `(access, refresh)` tokens of a link
    pub fn decrypt_tokens(
        &self,
        account: &connected_account::Model,
    ) -> Result<(Option<String>, Option<String>), StoreError> {
        decrypt_account_tokens(&self.crypto_key, account).map_err(|e| {
            tracing::error!(
                provider = %account.provider,
                provider_id = %account.provider_id,
                "Token decryption failed"
            );
            StoreError::Crypto(e)
        })
    }

    fn new_account(
        &self,
        id: Uuid,
        user_id: Uuid,
        provider: &str,
        identity: &ProviderIdentity,
        now: DateTime<Utc>,
    ) -> Result<connected_account::ActiveModel, StoreError> {
        let mut account = connected_account::ActiveModel {
            id: Set(id),
            user_id: Set(user_id),
            provider: Set(provider.to_string()),
            provider_id: Set(identity.id.clone()),
            created_at: Set(now),
            ..Default::default()
        };
        self.apply_snapshot(&mut account, provider, identity, now)?;
        Ok(account)
    }

    /// Copies the profile snapshot and freshly encrypted tokens onto `account`
    fn apply_snapshot(
        &self,
        account: &mut connected_account::ActiveModel,
        provider: &str,
        identity: &ProviderIdentity,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let (token_ciphertext, refresh_token_ciphertext) = encrypt_account_tokens(
            &self.crypto_key,
            provider,
            &identity.id,
            identity.token.as_deref(),
            identity.refresh_token.as_deref(),
        )?;

        account.name = Set(identity.name.clone());
        account.nickname = Set(identity.nickname.clone());
        account.email = Set(identity.email().map(str::to_string));
        account.avatar_path = Set(identity.avatar.clone());
        account.token_ciphertext = Set(token_ciphertext);
        account.refresh_token_ciphertext = Set(refresh_token_ciphertext);
        account.expires_at = Set(identity.expires_at);
        account.updated_at = Set(now);
        Ok(())
    }
}

#[async_trait]
impl AccountLinker for ConnectedAccountRepository {
    async fn find_connected_account(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<connected_account::Model>, StoreError> {
        self.find_by_provider_id(provider, provider_id).await
    }

    async fn create_connected_account(
        &self,
        user: &user::Model,
        provider: &str,
        identity: &ProviderIdentity,
    ) -> Result<connected_account::Model, StoreError> {
        let account = self.new_account(Uuid::new_v4(), user.id, provider, identity, Utc::now())?;
        let created = account
            .insert(&*self.db)
            .await
            .map_err(|e| StoreError::from_write(e, CONNECTED_ACCOUNT))?;

        tracing::info!(
            user_id = %user.id,
            provider = %provider,
            connected_account_id = %created.id,
            "Connected account created"
        );
        Ok(created)
    }

    async fn create_user_from_provider(
        &self,
        provider: &str,
        identity: &ProviderIdentity,
    ) -> Result<user::Model, StoreError> {
        let email = identity.email().ok_or(StoreError::MissingField("email"))?;
        let now = Utc::now();
        let user_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();

        let txn = self.db.begin().await?;

        let created_user = user::ActiveModel {
            id: Set(user_id),
            name: Set(identity.display_name()),
            email: Set(normalize_email(email)),
            email_verified_at: Set(Some(now)),
            current_connected_account_id: Set(Some(account_id)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| StoreError::from_write(e, USER))?;

        self.new_account(account_id, user_id, provider, identity, now)?
            .insert(&txn)
            .await
            .map_err(|e| StoreError::from_write(e, CONNECTED_ACCOUNT))?;

        txn.commit().await?;

        tracing::info!(
            user_id = %created_user.id,
            provider = %provider,
            connected_account_id = %account_id,
            "User created from provider identity"
        );
        Ok(created_user)
    }
}

#[async_trait]
impl AccountUpdater for ConnectedAccountRepository {
    async fn update_connected_account(
        &self,
        user: &user::Model,
        account: &connected_account::Model,
        provider: &str,
        identity: &ProviderIdentity,
    ) -> Result<connected_account::Model, StoreError> {
        let mut active = account.clone().into_active_model();
        active.user_id = Set(user.id);
        self.apply_snapshot(&mut active, provider, identity, Utc::now())?;

        Ok(active.update(&*self.db).await?)
    }

    async fn set_current_connected_account(
        &self,
        user: &user::Model,
        account: &connected_account::Model,
    ) -> Result<(), StoreError> {
        let mut active = user.clone().into_active_model();
        active.current_connected_account_id = Set(Some(account.id));
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }
}
