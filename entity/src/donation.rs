use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// gateway settlement axis, one-way created -> paid | failed
#[derive(EnumIter, DeriveActiveEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "created")]
    Created,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// operational fulfillment axis, independent of payment status
#[derive(EnumIter, DeriveActiveEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// tree donation orders

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "donations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: i32,

    pub full_name: String,
    pub email: String,
    pub phone: String,

    pub number_of_trees: i32,
    pub tree_species: String,
    pub planting_location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub objective: String,
    pub dedication_name: String,
    #[sea_orm(column_type = "Text")]
    pub notes: String,

    /// number_of_trees * unit price * 100, frozen once paid
    pub amount_paise: i64,
    pub currency: String,

    pub payment_status: PaymentStatus,
    pub approval_status: ApprovalStatus,

    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,

    /// opaque public id for unauthenticated tracking, never exposes pii
    pub tracking_token: String,

    /// data create time
    pub created_at: i64,
    pub paid_at: Option<i64>,
    pub approved_at: Option<i64>,

    pub is_user_deleted: bool,
    pub user_deleted_at: Option<i64>,

    // plantation proof, filled by the operator on approval
    pub planted_location: String,
    pub planted_latitude: Option<f64>,
    pub planted_longitude: Option<f64>,
    /// plantation day, epoch seconds at midnight utc
    pub plantation_date: Option<i64>,
    pub trees_planted_count: Option<i32>,
    #[sea_orm(column_type = "Text")]
    pub plantation_update: String,
    pub proof_image_1: Option<String>,
    pub proof_image_2: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub thank_you_note: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
