use crate::{
    db::DbPool,
    entities::discount::{self, DiscountType, Entity as DiscountEntity},
    entities::order::{self, Entity as OrderEntity},
    errors::ServiceError,
    services::pricing::AppliedDiscount,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateDiscountRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub code: Option<String>,
    pub discount_type: DiscountType,
    #[validate(custom = "crate::entities::validate_positive")]
    pub value: Decimal,
    pub is_active: Option<bool>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateDiscountRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub code: Option<String>,
    pub discount_type: Option<DiscountType>,
    #[validate(custom = "crate::entities::validate_positive")]
    pub value: Option<Decimal>,
    pub is_active: Option<bool>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Answer to a code check at the till
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiscountValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<discount::Model>,
}

impl DiscountValidation {
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
            discount: None,
        }
    }
}

fn check_rules(
    discount_type: DiscountType,
    value: Decimal,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), ServiceError> {
    if discount_type == DiscountType::Percentage && value > dec!(100) {
        return Err(ServiceError::ValidationError(
            "Percentage discount cannot exceed 100".to_string(),
        ));
    }
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ServiceError::ValidationError(
                "start_date must not be after end_date".to_string(),
            ));
        }
    }
    Ok(())
}

/// Resolves a code against `today`; the reason is returned when it cannot be used.
pub fn evaluate_code(found: Option<discount::Model>, code: &str, today: NaiveDate) -> DiscountValidation {
    match found {
        None => DiscountValidation::rejected(format!("Discount code '{}' does not exist", code)),
        Some(d) if !d.is_active => {
            DiscountValidation::rejected(format!("Discount code '{}' is not active", code))
        }
        Some(d) if !d.is_valid_on(today) => DiscountValidation::rejected(format!(
            "Discount code '{}' is not valid today",
            code
        )),
        Some(d) => DiscountValidation {
            valid: true,
            message: None,
            discount: Some(d),
        },
    }
}

/// Pricing view of a stored discount.
pub fn as_applied(model: &discount::Model) -> Option<AppliedDiscount> {
    model.kind().map(|discount_type| AppliedDiscount {
        discount_type,
        value: model.value,
    })
}

#[derive(Clone)]
pub struct DiscountService {
    db_pool: Arc<DbPool>,
}

impl DiscountService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn ensure_unique_code(&self, code: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = DiscountEntity::find().filter(discount::Column::Code.eq(code));
        if let Some(id) = except {
            query = query.filter(discount::Column::Id.ne(id));
        }
        let taken = query.count(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to check discount code");
            ServiceError::DatabaseError(e)
        })?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "Discount code '{}' already exists",
                code
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(&self, request: CreateDiscountRequest) -> Result<discount::Model, ServiceError> {
        request.validate()?;
        check_rules(
            request.discount_type,
            request.value,
            request.start_date,
            request.end_date,
        )?;
        let code = request.code.map(|c| c.trim().to_string());
        if let Some(code) = &code {
            self.ensure_unique_code(code, None).await?;
        }

        let now = Utc::now();
        let created = discount::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            code: Set(code),
            discount_type: Set(request.discount_type.to_string()),
            value: Set(request.value),
            is_active: Set(request.is_active.unwrap_or(true)),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create discount");
            ServiceError::DatabaseError(e)
        })?;
        info!(discount_id = %created.id, "Discount created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<discount::Model, ServiceError> {
        DiscountEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, discount_id = %id, "Failed to fetch discount");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Discount {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        search: Option<String>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<discount::Model>, u64), ServiceError> {
        let mut query = DiscountEntity::find();
        if let Some(term) = search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                sea_orm::Condition::any()
                    .add(discount::Column::Name.contains(term))
                    .add(discount::Column::Code.contains(term)),
            );
        }
        let paginator = query
            .order_by_desc(discount::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count discounts");
            ServiceError::DatabaseError(e)
        })?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list discounts");
                ServiceError::DatabaseError(e)
            })?;
        Ok((items, total))
    }

    /// Active discounts whose window contains today.
    pub async fn list_active(&self) -> Result<Vec<discount::Model>, ServiceError> {
        let today = Utc::now().date_naive();
        let all = DiscountEntity::find()
            .filter(discount::Column::IsActive.eq(true))
            .order_by_asc(discount::Column::Name)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list active discounts");
                ServiceError::DatabaseError(e)
            })?;
        Ok(all.into_iter().filter(|d| d.is_valid_on(today)).collect())
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateDiscountRequest,
    ) -> Result<discount::Model, ServiceError> {
        request.validate()?;
        let existing = self.get(id).await?;

        let discount_type = request
            .discount_type
            .or_else(|| existing.kind())
            .unwrap_or(DiscountType::Fixed);
        let value = request.value.unwrap_or(existing.value);
        let start = request.start_date.or(existing.start_date);
        let end = request.end_date.or(existing.end_date);
        check_rules(discount_type, value, start, end)?;

        let mut active = existing.into_active_model();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(code) = request.code {
            let code = code.trim().to_string();
            self.ensure_unique_code(&code, Some(id)).await?;
            active.code = Set(Some(code));
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        active.discount_type = Set(discount_type.to_string());
        active.value = Set(value);
        active.start_date = Set(start);
        active.end_date = Set(end);

        active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, discount_id = %id, "Failed to update discount");
            ServiceError::DatabaseError(e)
        })
    }

    /// Deletes a discount no order points at.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        let references = OrderEntity::find()
            .filter(order::Column::DiscountId.eq(id))
            .count(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, discount_id = %id, "Failed to count discount references");
                ServiceError::DatabaseError(e)
            })?;
        if references > 0 {
            return Err(ServiceError::Conflict(format!(
                "Discount '{}' is used by {} order(s); deactivate it instead",
                existing.name, references
            )));
        }
        DiscountEntity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, discount_id = %id, "Failed to delete discount");
                ServiceError::DatabaseError(e)
            })?;
        Ok(())
    }

    pub async fn find_by_code<C: ConnectionTrait>(
        conn: &C,
        code: &str,
    ) -> Result<Option<discount::Model>, ServiceError> {
        DiscountEntity::find()
            .filter(discount::Column::Code.eq(code))
            .one(conn)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to look up discount code");
                ServiceError::DatabaseError(e)
            })
    }

    /// Case-sensitive code check against today's date.
    #[instrument(skip(self))]
    pub async fn validate_code(&self, code: &str) -> Result<DiscountValidation, ServiceError> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(DiscountValidation::rejected("Discount code is required"));
        }
        let found = Self::find_by_code(&*self.db_pool, code).await?;
        Ok(evaluate_code(found, code, Utc::now().date_naive()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(active: bool, start: Option<NaiveDate>, end: Option<NaiveDate>) -> discount::Model {
        discount::Model {
            id: Uuid::new_v4(),
            name: "Lunch deal".into(),
            code: Some("LUNCH".into()),
            discount_type: "Fixed".into(),
            value: dec!(50),
            is_active: active,
            start_date: start,
            end_date: end,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn unknown_inactive_and_expired_codes_are_rejected() {
        let today = date(6, 15);
        assert!(!evaluate_code(None, "NOPE", today).valid);
        assert!(!evaluate_code(Some(model(false, None, None)), "LUNCH", today).valid);

        let expired = evaluate_code(Some(model(true, None, Some(date(6, 14)))), "LUNCH", today);
        assert!(!expired.valid);
        assert!(expired.message.unwrap().contains("not valid today"));
    }

    #[test]
    fn valid_code_carries_the_discount() {
        let result = evaluate_code(
            Some(model(true, Some(date(6, 15)), Some(date(6, 15)))),
            "LUNCH",
            date(6, 15),
        );
        assert!(result.valid);
        let applied = as_applied(result.discount.as_ref().unwrap()).unwrap();
        assert_eq!(applied, AppliedDiscount::fixed(dec!(50)));
    }

    #[test]
    fn percentage_over_100_and_inverted_window_fail() {
        assert!(check_rules(DiscountType::Percentage, dec!(101), None, None).is_err());
        assert!(check_rules(DiscountType::Fixed, dec!(500), None, None).is_ok());
        assert!(check_rules(DiscountType::Fixed, dec!(5), Some(date(2, 1)), Some(date(1, 1))).is_err());
    }
}
