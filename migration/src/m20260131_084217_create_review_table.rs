use entity::review;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = Table::create()
            .table(review::Entity)
            .if_not_exists()
            .col(
                ColumnDef::new(review::Column::Id)
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(review::Column::UserId).integer().null())
            .col(
                ColumnDef::new(review::Column::FullName)
                    .string_len(150)
                    .not_null()
                    .default(""),
            )
            .col(
                ColumnDef::new(review::Column::Email)
                    .string_len(255)
                    .not_null(),
            )
            .col(
                ColumnDef::new(review::Column::Rating)
                    .small_integer()
                    .not_null(),
            )
            .col(ColumnDef::new(review::Column::ReviewText).text().not_null())
            .col(
                ColumnDef::new(review::Column::IsPublic)
                    .boolean()
                    .not_null()
                    .default(true),
            )
            .col(
                ColumnDef::new(review::Column::CreatedAt)
                    .big_integer()
                    .not_null(),
            )
            .col(
                ColumnDef::new(review::Column::UpdatedAt)
                    .big_integer()
                    .not_null(),
            )
            .to_owned();

        manager.create_table(table).await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_review_email")
                    .col(review::Column::Email)
                    .table(review::Entity)
                    .unique()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("uq_review_email").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(review::Entity).to_owned())
            .await
    }
}
