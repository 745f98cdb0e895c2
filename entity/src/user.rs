use sea_orm::entity::prelude::*;

/// registered donor accounts

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub full_name: String,

    pub email: String,

    pub phone: String,

    /// argon2 hash
    #[sea_orm(column_type = "Text")]
    pub password_hash: String,

    pub avatar_url: Option<String>,

    pub is_verified: bool,

    /// pending email verification code, cleared on verify
    pub otp: Option<String>,

    /// data create time
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
