use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Snapshot of a closed period, written together with its end-day marker
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = SalesSummary)]
#[sea_orm(table_name = "sales_summaries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub end_day_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub order_count: i32,
    pub completed_orders: i32,
    pub pending_orders: i32,
    pub cancelled_orders: i32,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub tax_total: Decimal,
    pub service_charge_total: Decimal,
    pub delivery_total: Decimal,
    pub gross_sales: Decimal,
    pub cash_sales: Decimal,
    pub card_sales: Decimal,
    pub other_sales: Decimal,
    pub bill_adjustments_total: Decimal,
    pub advance_adjustments_total: Decimal,
    pub net_total: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::end_day::Entity",
        from = "Column::EndDayId",
        to = "super::end_day::Column::Id",
        on_delete = "Cascade"
    )]
    EndDay,
}

impl Related<super::end_day::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EndDay.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if insert {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
