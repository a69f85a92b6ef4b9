//! Migration to create the connected_accounts table.
//!
//! Each row links a local user to one `(provider, provider_id)` pair and keeps
//! the most recent profile and token snapshot returned by the provider.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ConnectedAccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConnectedAccounts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ConnectedAccounts::UserId).uuid().not_null())
                    .col(ColumnDef::new(ConnectedAccounts::Provider).text().not_null())
                    .col(
                        ColumnDef::new(ConnectedAccounts::ProviderId)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ConnectedAccounts::Name).text().null())
                    .col(ColumnDef::new(ConnectedAccounts::Nickname).text().null())
                    .col(ColumnDef::new(ConnectedAccounts::Email).text().null())
                    .col(ColumnDef::new(ConnectedAccounts::AvatarPath).text().null())
                    .col(
                        ColumnDef::new(ConnectedAccounts::TokenCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ConnectedAccounts::RefreshTokenCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ConnectedAccounts::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ConnectedAccounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ConnectedAccounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_connected_accounts_user_id")
                            .from(ConnectedAccounts::Table, ConnectedAccounts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one link per (provider, provider_id)
        manager
            .create_index(
                Index::create()
                    .name("idx_connected_accounts_provider_provider_id")
                    .table(ConnectedAccounts::Table)
                    .col(ConnectedAccounts::Provider)
                    .col(ConnectedAccounts::ProviderId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_connected_accounts_user_id")
                    .table(ConnectedAccounts::Table)
                    .col(ConnectedAccounts::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_connected_accounts_provider_provider_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_connected_accounts_user_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ConnectedAccounts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ConnectedAccounts {
    Table,
    Id,
    UserId,
    Provider,
    ProviderId,
    Name,
    Nickname,
    Email,
    AvatarPath,
    TokenCiphertext,
    RefreshTokenCiphertext,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
