use crate::{
    db::DbPool,
    entities::advance_adjustment::{self, Entity as AdvanceEntity},
    entities::bill_adjustment::{self, Entity as BillEntity},
    entities::bill_adjustment_image::{self, Entity as BillImageEntity},
    errors::ServiceError,
    services::audit::{self, actions, RequestContext},
    services::end_day::last_end_date,
    services::products::{image_etag, validate_image, StoredImage},
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateBillRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
    #[validate(custom = "crate::entities::validate_non_negative")]
    pub price: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateBillRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
    #[validate(custom = "crate::entities::validate_non_negative")]
    pub price: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAdvanceRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(custom = "crate::entities::validate_positive")]
    pub amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateAdvanceRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(custom = "crate::entities::validate_positive")]
    pub amount: Option<Decimal>,
    pub notes: Option<String>,
}

/// Date filter; only admins may look past the open period
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct AdjustmentFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AdjustmentReport {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub bill_count: u64,
    pub advance_count: u64,
    pub bill_total: Decimal,
    pub advance_total: Decimal,
    pub total: Decimal,
}

/// Report totals with the records behind them
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentStatement {
    pub report: AdjustmentReport,
    pub bills: Vec<bill_adjustment::Model>,
    pub advances: Vec<advance_adjustment::Model>,
}

/// Half-open `[from, to)` window over `created_at`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Window {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

fn month_start(today: NaiveDate) -> NaiveDate {
    today.with_day(1).unwrap_or(today)
}

/// Reports without any dates cover the current month.
fn month_by_default(filter: AdjustmentFilter) -> AdjustmentFilter {
    if filter.date_from.is_none() && filter.date_to.is_none() {
        AdjustmentFilter {
            date_from: Some(month_start(Utc::now().date_naive())),
            date_to: None,
        }
    } else {
        filter
    }
}

fn explicit_window(filter: &AdjustmentFilter) -> Window {
    Window {
        from: filter.date_from.map(start_of),
        to: filter.date_to.map(|d| start_of(d + Duration::days(1))),
    }
}

#[derive(Clone)]
pub struct AdjustmentService {
    db_pool: Arc<DbPool>,
}

impl AdjustmentService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Non-admins never see past the last End Day marker.
    async fn scoped_window(
        &self,
        filter: &AdjustmentFilter,
        ctx: &RequestContext,
    ) -> Result<Window, ServiceError> {
        if ctx.is_admin {
            return Ok(explicit_window(filter));
        }
        let requested = explicit_window(filter);
        let floor = last_end_date(&*self.db_pool).await?;
        let from = match (requested.from, floor) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        Ok(Window {
            from,
            to: requested.to,
        })
    }

    async fn bills_in(&self, window: Window) -> Result<Vec<bill_adjustment::Model>, ServiceError> {
        let mut query = BillEntity::find();
        if let Some(from) = window.from {
            query = query.filter(bill_adjustment::Column::CreatedAt.gte(from));
        }
        if let Some(to) = window.to {
            query = query.filter(bill_adjustment::Column::CreatedAt.lt(to));
        }
        query
            .order_by_desc(bill_adjustment::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list bill adjustments");
                ServiceError::DatabaseError(e)
            })
    }

    async fn advances_in(&self, window: Window) -> Result<Vec<advance_adjustment::Model>, ServiceError> {
        let mut query = AdvanceEntity::find();
        if let Some(from) = window.from {
            query = query.filter(advance_adjustment::Column::CreatedAt.gte(from));
        }
        if let Some(to) = window.to {
            query = query.filter(advance_adjustment::Column::CreatedAt.lt(to));
        }
        query
            .order_by_desc(advance_adjustment::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list advance adjustments");
                ServiceError::DatabaseError(e)
            })
    }

    /// Bill records must be visible to the caller before they can be changed.
    fn ensure_visible(
        created_at: DateTime<Utc>,
        window: Window,
        what: &str,
        id: Uuid,
    ) -> Result<(), ServiceError> {
        if window.from.map_or(false, |from| created_at < from) {
            return Err(ServiceError::NotFound(format!("{} {} not found", what, id)));
        }
        Ok(())
    }

    // Bills

    #[instrument(skip(self, request, ctx), fields(name = %request.name))]
    pub async fn create_bill(
        &self,
        request: CreateBillRequest,
        ctx: &RequestContext,
    ) -> Result<bill_adjustment::Model, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let created = bill_adjustment::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            quantity: Set(request.quantity),
            price: Set(request.price),
            notes: Set(request.notes),
            created_by: Set(ctx.user_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create bill adjustment");
            ServiceError::DatabaseError(e)
        })?;
        info!(bill_id = %created.id, price = %created.price, "Bill adjustment recorded");
        Ok(created)
    }

    pub async fn list_bills(
        &self,
        filter: AdjustmentFilter,
        ctx: &RequestContext,
    ) -> Result<Vec<bill_adjustment::Model>, ServiceError> {
        let window = self.scoped_window(&filter, ctx).await?;
        self.bills_in(window).await
    }

    pub async fn get_bill(
        &self,
        id: Uuid,
        ctx: &RequestContext,
    ) -> Result<bill_adjustment::Model, ServiceError> {
        let bill = BillEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, bill_id = %id, "Failed to fetch bill adjustment");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Bill adjustment {} not found", id)))?;
        let window = self.scoped_window(&AdjustmentFilter::default(), ctx).await?;
        Self::ensure_visible(bill.created_at, window, "Bill adjustment", id)?;
        Ok(bill)
    }

    #[instrument(skip(self, request, ctx))]
    pub async fn update_bill(
        &self,
        id: Uuid,
        request: UpdateBillRequest,
        ctx: &RequestContext,
    ) -> Result<bill_adjustment::Model, ServiceError> {
        request.validate()?;
        let existing = self.get_bill(id, ctx).await?;
        let mut active = existing.into_active_model();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(quantity) = request.quantity {
            active.quantity = Set(Some(quantity));
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, bill_id = %id, "Failed to update bill adjustment");
            ServiceError::DatabaseError(e)
        })
    }

    /// Admin only; the images go with the bill.
    #[instrument(skip(self, ctx))]
    pub async fn delete_bill(&self, id: Uuid, ctx: &RequestContext) -> Result<(), ServiceError> {
        if !ctx.is_admin {
            return Err(ServiceError::Forbidden(
                "Only administrators can delete bill adjustments".to_string(),
            ));
        }
        let existing = self.get_bill(id, ctx).await?;

        BillImageEntity::delete_many()
            .filter(bill_adjustment_image::Column::BillAdjustmentId.eq(id))
            .exec(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, bill_id = %id, "Failed to delete bill images");
                ServiceError::DatabaseError(e)
            })?;
        BillEntity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, bill_id = %id, "Failed to delete bill adjustment");
                ServiceError::DatabaseError(e)
            })?;
        audit::record(
            &*self.db_pool,
            ctx,
            actions::BILL_DELETE,
            "bill_adjustment",
            Some(id),
            Some(format!("{} {}", existing.name, existing.price)),
        )
        .await?;
        info!(bill_id = %id, "Bill adjustment deleted");
        Ok(())
    }

    #[instrument(skip(self, bytes, ctx), fields(size = bytes.len()))]
    pub async fn add_bill_image(
        &self,
        bill_id: Uuid,
        content_type: &str,
        bytes: Vec<u8>,
        ctx: &RequestContext,
    ) -> Result<bill_adjustment_image::Model, ServiceError> {
        let content_type = validate_image(content_type, &bytes)?;
        self.get_bill(bill_id, ctx).await?;
        bill_adjustment_image::ActiveModel {
            id: Set(Uuid::new_v4()),
            bill_adjustment_id: Set(bill_id),
            content_type: Set(content_type),
            data: Set(bytes),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, %bill_id, "Failed to store bill image");
            ServiceError::DatabaseError(e)
        })
    }

    /// Image metadata for a bill, without the bytes.
    pub async fn list_bill_images(
        &self,
        bill_id: Uuid,
        ctx: &RequestContext,
    ) -> Result<Vec<bill_adjustment_image::Model>, ServiceError> {
        self.get_bill(bill_id, ctx).await?;
        BillImageEntity::find()
            .filter(bill_adjustment_image::Column::BillAdjustmentId.eq(bill_id))
            .order_by_asc(bill_adjustment_image::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %bill_id, "Failed to list bill images");
                ServiceError::DatabaseError(e)
            })
    }

    async fn find_image(
        &self,
        bill_id: Uuid,
        image_id: Uuid,
    ) -> Result<bill_adjustment_image::Model, ServiceError> {
        BillImageEntity::find_by_id(image_id)
            .filter(bill_adjustment_image::Column::BillAdjustmentId.eq(bill_id))
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %image_id, "Failed to fetch bill image");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Image {} not found", image_id)))
    }

    pub async fn get_bill_image(
        &self,
        bill_id: Uuid,
        image_id: Uuid,
        ctx: &RequestContext,
    ) -> Result<StoredImage, ServiceError> {
        self.get_bill(bill_id, ctx).await?;
        let image = self.find_image(bill_id, image_id).await?;
        Ok(StoredImage {
            etag: image_etag(&image.data),
            content_type: image.content_type,
            bytes: image.data,
        })
    }

    pub async fn delete_bill_image(
        &self,
        bill_id: Uuid,
        image_id: Uuid,
        ctx: &RequestContext,
    ) -> Result<(), ServiceError> {
        self.get_bill(bill_id, ctx).await?;
        self.find_image(bill_id, image_id).await?;
        BillImageEntity::delete_by_id(image_id)
            .exec(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %image_id, "Failed to delete bill image");
                ServiceError::DatabaseError(e)
            })?;
        Ok(())
    }

    // Advances

    #[instrument(skip(self, request, ctx), fields(name = %request.name))]
    pub async fn create_advance(
        &self,
        request: CreateAdvanceRequest,
        ctx: &RequestContext,
    ) -> Result<advance_adjustment::Model, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let created = advance_adjustment::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            amount: Set(request.amount),
            notes: Set(request.notes),
            created_by: Set(ctx.user_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create advance adjustment");
            ServiceError::DatabaseError(e)
        })?;
        info!(advance_id = %created.id, amount = %created.amount, "Advance recorded");
        Ok(created)
    }

    pub async fn list_advances(
        &self,
        filter: AdjustmentFilter,
        ctx: &RequestContext,
    ) -> Result<Vec<advance_adjustment::Model>, ServiceError> {
        let window = self.scoped_window(&filter, ctx).await?;
        self.advances_in(window).await
    }

    pub async fn get_advance(
        &self,
        id: Uuid,
        ctx: &RequestContext,
    ) -> Result<advance_adjustment::Model, ServiceError> {
        let advance = AdvanceEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, advance_id = %id, "Failed to fetch advance adjustment");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Advance adjustment {} not found", id)))?;
        let window = self.scoped_window(&AdjustmentFilter::default(), ctx).await?;
        Self::ensure_visible(advance.created_at, window, "Advance adjustment", id)?;
        Ok(advance)
    }

    #[instrument(skip(self, request, ctx))]
    pub async fn update_advance(
        &self,
        id: Uuid,
        request: UpdateAdvanceRequest,
        ctx: &RequestContext,
    ) -> Result<advance_adjustment::Model, ServiceError> {
        request.validate()?;
        let existing = self.get_advance(id, ctx).await?;
        let mut active = existing.into_active_model();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(amount) = request.amount {
            active.amount = Set(amount);
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, advance_id = %id, "Failed to update advance adjustment");
            ServiceError::DatabaseError(e)
        })
    }

    /// Advances stay on record for reconciliation.
    pub async fn delete_advance(&self, id: Uuid) -> Result<(), ServiceError> {
        Err(ServiceError::InvalidOperation(format!(
            "Advance adjustment {} cannot be deleted",
            id
        )))
    }

    /// Totals for the requested range, defaulting to the current month.
    #[instrument(skip(self, ctx))]
    pub async fn report(
        &self,
        filter: AdjustmentFilter,
        ctx: &RequestContext,
    ) -> Result<AdjustmentReport, ServiceError> {
        let window = self.scoped_window(&month_by_default(filter), ctx).await?;
        self.report_in(window).await
    }

    /// Totals and the individual bills and advances for the printed statement.
    #[instrument(skip(self, ctx))]
    pub async fn statement(
        &self,
        filter: AdjustmentFilter,
        ctx: &RequestContext,
    ) -> Result<AdjustmentStatement, ServiceError> {
        let window = self.scoped_window(&month_by_default(filter), ctx).await?;
        Ok(AdjustmentStatement {
            report: self.report_in(window).await?,
            bills: self.bills_in(window).await?,
            advances: self.advances_in(window).await?,
        })
    }

    async fn report_in(&self, window: Window) -> Result<AdjustmentReport, ServiceError> {
        let bill_base = Self::filtered(BillEntity::find(), window, bill_adjustment::Column::CreatedAt);
        let bill_count = bill_base.clone().count(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to count bill adjustments");
            ServiceError::DatabaseError(e)
        })?;
        let bill_total: Option<Decimal> = bill_base
            .select_only()
            .column_as(bill_adjustment::Column::Price.sum(), "total")
            .into_tuple::<Option<Decimal>>()
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to sum bill adjustments");
                ServiceError::DatabaseError(e)
            })?
            .flatten();

        let advance_base =
            Self::filtered(AdvanceEntity::find(), window, advance_adjustment::Column::CreatedAt);
        let advance_count = advance_base.clone().count(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to count advance adjustments");
            ServiceError::DatabaseError(e)
        })?;
        let advance_total: Option<Decimal> = advance_base
            .select_only()
            .column_as(advance_adjustment::Column::Amount.sum(), "total")
            .into_tuple::<Option<Decimal>>()
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to sum advance adjustments");
                ServiceError::DatabaseError(e)
            })?
            .flatten();

        let bill_total = bill_total.unwrap_or_default();
        let advance_total = advance_total.unwrap_or_default();
        Ok(AdjustmentReport {
            from: window.from,
            to: window.to,
            bill_count,
            advance_count,
            bill_total,
            advance_total,
            total: bill_total + advance_total,
        })
    }

    fn filtered<E, C>(query: sea_orm::Select<E>, window: Window, column: C) -> sea_orm::Select<E>
    where
        E: EntityTrait,
        C: ColumnTrait,
    {
        let mut query = query;
        if let Some(from) = window.from {
            query = query.filter(column.gte(from));
        }
        if let Some(to) = window.to {
            query = query.filter(column.lt(to));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_window_includes_the_end_day() {
        let filter = AdjustmentFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 3, 1),
            date_to: NaiveDate::from_ymd_opt(2024, 3, 31),
        };
        let window = explicit_window(&filter);
        assert_eq!(window.from.unwrap().to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(window.to.unwrap().to_rfc3339(), "2024-04-01T00:00:00+00:00");
    }

    #[test]
    fn month_start_is_the_first() {
        let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(month_start(day), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn records_before_the_window_are_hidden() {
        let from = start_of(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        let window = Window {
            from: Some(from),
            to: None,
        };
        let id = Uuid::new_v4();
        assert!(AdjustmentService::ensure_visible(from - Duration::hours(1), window, "Bill", id).is_err());
        assert!(AdjustmentService::ensure_visible(from, window, "Bill", id).is_ok());
    }
}
