use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum DiscountType {
    #[serde(alias = "percentage")]
    Percentage,
    #[serde(alias = "fixed")]
    Fixed,
}

/// Discount that can be applied to an order, optionally through a code
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate, ToSchema)]
#[schema(as = Discount)]
#[sea_orm(table_name = "discounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[sea_orm(unique)]
    #[validate(length(min = 1, max = 50))]
    pub code: Option<String>,

    pub discount_type: String,

    #[validate(custom = "super::validate_positive")]
    pub value: Decimal,

    pub is_active: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn kind(&self) -> Option<DiscountType> {
        self.discount_type.parse().ok()
    }

    /// Active and inside its validity window on `today`; open bounds always match.
    pub fn is_valid_on(&self, today: NaiveDate) -> bool {
        self.is_active
            && self.start_date.map_or(true, |start| start <= today)
            && self.end_date.map_or(true, |end| end >= today)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
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

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn discount(start: Option<NaiveDate>, end: Option<NaiveDate>, active: bool) -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "Eid Special".into(),
            code: Some("EID10".into()),
            discount_type: DiscountType::Percentage.to_string(),
            value: dec!(10),
            is_active: active,
            start_date: start,
            end_date: end,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let d = discount(Some(day(10)), Some(day(12)), true);
        assert!(!d.is_valid_on(day(9)));
        assert!(d.is_valid_on(day(10)));
        assert!(d.is_valid_on(day(12)));
        assert!(!d.is_valid_on(day(13)));
    }

    #[test]
    fn open_window_and_inactive_flag() {
        assert!(discount(None, None, true).is_valid_on(day(1)));
        assert!(!discount(None, None, false).is_valid_on(day(1)));
    }
}
