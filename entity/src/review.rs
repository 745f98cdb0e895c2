use sea_orm::entity::prelude::*;

/// donor reviews, one per email

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: Option<i32>,

    pub full_name: String,

    pub email: String,

    /// 1..=5
    pub rating: i16,

    #[sea_orm(column_type = "Text")]
    pub review_text: String,

    pub is_public: bool,

    /// data create time
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
