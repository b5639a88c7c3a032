use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Order lifecycle status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

/// Whether the order has been settled
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

/// Fulfillment type; decides which charges apply
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum OrderType {
    #[serde(rename = "Dine In", alias = "DineIn", alias = "dine_in")]
    #[strum(serialize = "Dine In")]
    DineIn,
    #[serde(rename = "Take Away", alias = "TakeAway", alias = "take_away")]
    #[strum(serialize = "Take Away")]
    TakeAway,
    #[serde(alias = "delivery")]
    Delivery,
}

/// Payment method; `Card` selects the card tax rate, anything else the cash rate
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum PaymentMethod {
    #[serde(alias = "cash")]
    Cash,
    #[serde(alias = "card")]
    Card,
    #[serde(alias = "other")]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate, ToSchema)]
#[schema(as = Order)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub order_number: String,

    /// Cashier who rang the order up
    pub user_id: Option<Uuid>,

    #[validate(length(max = 100))]
    pub customer_name: Option<String>,

    #[validate(length(max = 20))]
    pub customer_phone: Option<String>,

    pub order_type: String,
    pub payment_method: String,

    pub discount_id: Option<Uuid>,
    /// Manual discount entered at the till when no code is linked
    pub manual_discount_type: Option<String>,
    pub manual_discount_value: Option<Decimal>,

    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    /// Tax percentage applied at the last recomputation
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub service_charge: Decimal,
    pub delivery_charges: Decimal,
    pub total_amount: Decimal,

    pub order_status: String,
    pub payment_status: String,

    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn status(&self) -> Option<OrderStatus> {
        self.order_status.parse().ok()
    }

    pub fn is_pending(&self) -> bool {
        self.status() == Some(OrderStatus::Pending)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::payment_transaction::Entity")]
    PaymentTransactions,
    #[sea_orm(
        belongs_to = "super::discount::Entity",
        from = "Column::DiscountId",
        to = "super::discount::Column::Id"
    )]
    Discount,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::payment_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentTransactions.def()
    }
}

impl Related<super::discount::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Discount.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);

        let model: Model = active_model.clone().try_into().map_err(|_| {
            DbErr::Custom("Failed to convert ActiveModel to Model for validation".to_string())
        })?;
        model.validate().map_err(super::validation_db_err)?;

        Ok(active_model)
    }
}
