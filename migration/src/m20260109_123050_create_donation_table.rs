use entity::donation;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = Table::create()
            .table(donation::Entity)
            .if_not_exists()
            .col(
                ColumnDef::new(donation::Column::Id)
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(
                ColumnDef::new(donation::Column::UserId)
                    .integer()
                    .not_null(),
            )
            .col(
                ColumnDef::new(donation::Column::FullName)
                    .string_len(150)
                    .not_null(),
            )
            .col(
                ColumnDef::new(donation::Column::Email)
                    .string_len(255)
                    .not_null(),
            )
            .col(
                ColumnDef::new(donation::Column::Phone)
                    .string_len(20)
                    .not_null(),
            )
            .col(
                ColumnDef::new(donation::Column::NumberOfTrees)
                    .integer()
                    .not_null(),
            )
            .col(
                ColumnDef::new(donation::Column::TreeSpecies)
                    .string_len(100)
                    .not_null()
                    .default(""),
            )
            .col(
                ColumnDef::new(donation::Column::PlantingLocation)
                    .string_len(255)
                    .not_null(),
            )
            .col(ColumnDef::new(donation::Column::Latitude).double().null())
            .col(ColumnDef::new(donation::Column::Longitude).double().null())
            .col(
                ColumnDef::new(donation::Column::Objective)
                    .string_len(255)
                    .not_null(),
            )
            .col(
                ColumnDef::new(donation::Column::DedicationName)
                    .string_len(255)
                    .not_null()
                    .default(""),
            )
            .col(ColumnDef::new(donation::Column::Notes).text().not_null())
            .col(
                ColumnDef::new(donation::Column::AmountPaise)
                    .big_integer()
                    .not_null(),
            )
            .col(
                ColumnDef::new(donation::Column::Currency)
                    .string_len(10)
                    .not_null(),
            )
            .col(
                ColumnDef::new(donation::Column::PaymentStatus)
                    .string_len(20)
                    .not_null(),
            )
            .col(
                ColumnDef::new(donation::Column::ApprovalStatus)
                    .string_len(20)
                    .not_null(),
            )
            .col(
                ColumnDef::new(donation::Column::GatewayOrderId)
                    .string_len(100)
                    .not_null(),
            )
            .col(
                ColumnDef::new(donation::Column::GatewayPaymentId)
                    .string_len(100)
                    .null(),
            )
            .col(
                ColumnDef::new(donation::Column::GatewaySignature)
                    .string_len(255)
                    .null(),
            )
            .col(
                ColumnDef::new(donation::Column::TrackingToken)
                    .string_len(40)
                    .not_null(),
            )
            .col(
                ColumnDef::new(donation::Column::CreatedAt)
                    .big_integer()
                    .not_null(),
            )
            .col(ColumnDef::new(donation::Column::PaidAt).big_integer().null())
            .col(
                ColumnDef::new(donation::Column::ApprovedAt)
                    .big_integer()
                    .null(),
            )
            .col(
                ColumnDef::new(donation::Column::IsUserDeleted)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .col(
                ColumnDef::new(donation::Column::UserDeletedAt)
                    .big_integer()
                    .null(),
            )
            .col(
                ColumnDef::new(donation::Column::PlantedLocation)
                    .string_len(255)
                    .not_null()
                    .default(""),
            )
            .col(
                ColumnDef::new(donation::Column::PlantedLatitude)
                    .double()
                    .null(),
            )
            .col(
                ColumnDef::new(donation::Column::PlantedLongitude)
                    .double()
                    .null(),
            )
            .col(
                ColumnDef::new(donation::Column::PlantationDate)
                    .big_integer()
                    .null(),
            )
            .col(
                ColumnDef::new(donation::Column::TreesPlantedCount)
                    .integer()
                    .null(),
            )
            .col(
                ColumnDef::new(donation::Column::PlantationUpdate)
                    .text()
                    .not_null(),
            )
            .col(
                ColumnDef::new(donation::Column::ProofImage1)
                    .string_len(255)
                    .null(),
            )
            .col(
                ColumnDef::new(donation::Column::ProofImage2)
                    .string_len(255)
                    .null(),
            )
            .col(
                ColumnDef::new(donation::Column::ThankYouNote)
                    .text()
                    .not_null(),
            )
            .to_owned();

        manager.create_table(table).await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_donation_gateway_order_id")
                    .col(donation::Column::GatewayOrderId)
                    .table(donation::Entity)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_donation_tracking_token")
                    .col(donation::Column::TrackingToken)
                    .table(donation::Entity)
                    .unique()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("uq_donation_gateway_order_id").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("uq_donation_tracking_token").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(donation::Entity).to_owned())
            .await
    }
}
