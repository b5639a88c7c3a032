use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Receipt photo attached to a bill adjustment
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = BillAdjustmentImage)]
#[sea_orm(table_name = "bill_adjustment_images")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub bill_adjustment_id: Uuid,
    pub content_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bill_adjustment::Entity",
        from = "Column::BillAdjustmentId",
        to = "super::bill_adjustment::Column::Id",
        on_delete = "Cascade"
    )]
    BillAdjustment,
}

impl Related<super::bill_adjustment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BillAdjustment.def()
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
