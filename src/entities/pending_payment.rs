use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pending payment record created when a hosted checkout session is opened.
///
/// Holds the denormalized cart snapshot and price breakdown captured at
/// session-creation time. Mutated only by payment reconciliation (the
/// `unpaid -> paid` transition is one-way) and never deleted: rows double as
/// the audit trail for every checkout attempt.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pending_payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    /// Opaque session id issued by the external provider; globally unique
    #[sea_orm(unique)]
    pub checkout_session_id: String,
    pub status: PaymentStatus,
    pub payment_method: String,
    /// Snapshot of the cart line items (JSON array of `SnapshotLineItem`)
    #[sea_orm(column_type = "Json")]
    pub line_items: Json,
    #[sea_orm(column_type = "Json")]
    pub shipping_address: Json,
    pub currency: String,
    pub items_subtotal_minor: i64,
    pub shipping_fee_minor: i64,
    pub tax_minor: i64,
    pub total_minor: i64,
    #[sea_orm(nullable)]
    pub receipt_url: Option<String>,
    /// Set when reconciliation materializes the order
    #[sea_orm(nullable)]
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Payment status as reported by the provider and persisted here
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "failed")]
    Failed,
}
