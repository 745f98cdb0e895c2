use entity::user;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = Table::create()
            .table(user::Entity)
            .if_not_exists()
            .col(
                ColumnDef::new(user::Column::Id)
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(
                ColumnDef::new(user::Column::FullName)
                    .string_len(150)
                    .not_null(),
            )
            .col(
                ColumnDef::new(user::Column::Email)
                    .string_len(255)
                    .not_null(),
            )
            .col(
                ColumnDef::new(user::Column::Phone)
                    .string_len(20)
                    .not_null(),
            )
            .col(
                ColumnDef::new(user::Column::PasswordHash)
                    .text()
                    .not_null(),
            )
            .col(ColumnDef::new(user::Column::AvatarUrl).string_len(255).null())
            .col(
                ColumnDef::new(user::Column::IsVerified)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(ColumnDef::new(user::Column::Otp).string_len(6).null())
            .col(
                ColumnDef::new(user::Column::CreatedAt)
                    .big_integer()
                    .not_null(),
            )
            .col(
                ColumnDef::new(user::Column::UpdatedAt)
                    .big_integer()
                    .not_null(),
            )
            .to_owned();

        manager.create_table(table).await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_user_email")
                    .col(user::Column::Email)
                    .table(user::Entity)
                    .unique()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("uq_user_email").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(user::Entity).to_owned())
            .await
    }
}
