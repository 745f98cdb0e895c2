pub use sea_orm_migration::prelude::*;

mod m20260109_121433_create_user_table;
mod m20260109_123050_create_donation_table;
mod m20260131_084217_create_review_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260109_121433_create_user_table::Migration),
            Box::new(m20260109_123050_create_donation_table::Migration),
            Box::new(m20260131_084217_create_review_table::Migration),
        ]
    }
}
