use crate::{
    db::{self, DbPool},
    entities::advance_adjustment::{self, Entity as AdvanceEntity},
    entities::bill_adjustment::{self, Entity as BillEntity},
    entities::end_day::{self, Entity as EndDayEntity},
    entities::order::{self, Entity as OrderEntity, OrderStatus, PaymentMethod},
    entities::sales_summary::{self, Entity as SalesSummaryEntity},
    errors::ServiceError,
    events::{self, Event, EventSender},
    services::audit::{self, actions, RequestContext},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Figures for one sales period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PeriodTotals {
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
}

impl PeriodTotals {
    fn empty(period_start: DateTime<Utc>, period_end: DateTime<Utc>) -> Self {
        Self {
            period_start,
            period_end,
            order_count: 0,
            completed_orders: 0,
            pending_orders: 0,
            cancelled_orders: 0,
            subtotal: Decimal::ZERO,
            discount_total: Decimal::ZERO,
            tax_total: Decimal::ZERO,
            service_charge_total: Decimal::ZERO,
            delivery_total: Decimal::ZERO,
            gross_sales: Decimal::ZERO,
            cash_sales: Decimal::ZERO,
            card_sales: Decimal::ZERO,
            other_sales: Decimal::ZERO,
            bill_adjustments_total: Decimal::ZERO,
            advance_adjustments_total: Decimal::ZERO,
            net_total: Decimal::ZERO,
        }
    }
}

/// Folds the period's orders and adjustments into totals.
///
/// Cancelled orders are counted but contribute no money.
pub fn summarize(
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    orders: &[order::Model],
    bill_total: Decimal,
    advance_total: Decimal,
) -> PeriodTotals {
    let mut totals = PeriodTotals::empty(period_start, period_end);
    for order in orders {
        totals.order_count += 1;
        match order.status() {
            Some(OrderStatus::Cancelled) => {
                totals.cancelled_orders += 1;
                continue;
            }
            Some(OrderStatus::Completed) => totals.completed_orders += 1,
            _ => totals.pending_orders += 1,
        }
        totals.subtotal += order.subtotal;
        totals.discount_total += order.discount_amount;
        totals.tax_total += order.tax_amount;
        totals.service_charge_total += order.service_charge;
        totals.delivery_total += order.delivery_charges;
        totals.gross_sales += order.total_amount;
        match order.payment_method.parse::<PaymentMethod>() {
            Ok(PaymentMethod::Cash) => totals.cash_sales += order.total_amount,
            Ok(PaymentMethod::Card) => totals.card_sales += order.total_amount,
            _ => totals.other_sales += order.total_amount,
        }
    }
    totals.bill_adjustments_total = bill_total;
    totals.advance_adjustments_total = advance_total;
    totals.net_total = totals.gross_sales - bill_total - advance_total;
    totals
}

/// End date of the most recent marker, if any day has been closed.
pub async fn last_end_date<C: ConnectionTrait>(conn: &C) -> Result<Option<DateTime<Utc>>, ServiceError> {
    let last = EndDayEntity::find()
        .order_by_desc(end_day::Column::EndDate)
        .one(conn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to load last end day");
            ServiceError::DatabaseError(e)
        })?;
    Ok(last.map(|m| m.end_date))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct RunEndDayRequest {
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Marker with the summary written alongside it
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EndDayRecord {
    pub end_day: end_day::Model,
    pub summary: Option<sales_summary::Model>,
}

#[derive(Clone)]
pub struct EndDayService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl EndDayService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn period_start<C: ConnectionTrait>(
        conn: &C,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ServiceError> {
        if let Some(end) = last_end_date(conn).await? {
            return Ok(end);
        }
        let earliest = OrderEntity::find()
            .order_by_asc(order::Column::CreatedAt)
            .one(conn)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load earliest order");
                ServiceError::DatabaseError(e)
            })?;
        Ok(earliest.map(|o| o.created_at).unwrap_or(now))
    }

    async fn totals_on<C: ConnectionTrait>(
        conn: &C,
        now: DateTime<Utc>,
    ) -> Result<PeriodTotals, ServiceError> {
        let start = Self::period_start(conn, now).await?;

        let orders = OrderEntity::find()
            .filter(order::Column::CreatedAt.gte(start))
            .filter(order::Column::CreatedAt.lt(now))
            .all(conn)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load period orders");
                ServiceError::DatabaseError(e)
            })?;
        let bills = BillEntity::find()
            .filter(bill_adjustment::Column::CreatedAt.gte(start))
            .filter(bill_adjustment::Column::CreatedAt.lt(now))
            .all(conn)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load period bill adjustments");
                ServiceError::DatabaseError(e)
            })?;
        let advances = AdvanceEntity::find()
            .filter(advance_adjustment::Column::CreatedAt.gte(start))
            .filter(advance_adjustment::Column::CreatedAt.lt(now))
            .all(conn)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load period advance adjustments");
                ServiceError::DatabaseError(e)
            })?;

        let bill_total = bills.iter().map(|b| b.price).sum();
        let advance_total = advances.iter().map(|a| a.amount).sum();
        Ok(summarize(start, now, &orders, bill_total, advance_total))
    }

    /// Totals of the open period without closing it.
    #[instrument(skip(self))]
    pub async fn current(&self) -> Result<PeriodTotals, ServiceError> {
        Self::totals_on(&*self.db_pool, Utc::now()).await
    }

    /// Closes the open period and stores its summary.
    #[instrument(skip(self, request, ctx))]
    pub async fn run(
        &self,
        request: RunEndDayRequest,
        ctx: &RequestContext,
    ) -> Result<EndDayRecord, ServiceError> {
        request.validate()?;
        let started = Instant::now();
        let txn = db::begin(&self.db_pool, "end_day.run").await?;
        let now = Utc::now();
        let totals = Self::totals_on(&txn, now).await?;

        let end_day_id = Uuid::new_v4();
        let marker = end_day::ActiveModel {
            id: Set(end_day_id),
            end_date: Set(now),
            notes: Set(request.notes),
            created_by: Set(ctx.user_id),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert end day marker");
            ServiceError::DatabaseError(e)
        })?;

        let summary = sales_summary::ActiveModel {
            id: Set(Uuid::new_v4()),
            end_day_id: Set(end_day_id),
            period_start: Set(totals.period_start),
            period_end: Set(totals.period_end),
            order_count: Set(totals.order_count),
            completed_orders: Set(totals.completed_orders),
            pending_orders: Set(totals.pending_orders),
            cancelled_orders: Set(totals.cancelled_orders),
            subtotal: Set(totals.subtotal),
            discount_total: Set(totals.discount_total),
            tax_total: Set(totals.tax_total),
            service_charge_total: Set(totals.service_charge_total),
            delivery_total: Set(totals.delivery_total),
            gross_sales: Set(totals.gross_sales),
            cash_sales: Set(totals.cash_sales),
            card_sales: Set(totals.card_sales),
            other_sales: Set(totals.other_sales),
            bill_adjustments_total: Set(totals.bill_adjustments_total),
            advance_adjustments_total: Set(totals.advance_adjustments_total),
            net_total: Set(totals.net_total),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert sales summary");
            ServiceError::DatabaseError(e)
        })?;

        audit::record(
            &txn,
            ctx,
            actions::END_DAY_RUN,
            "end_day",
            Some(end_day_id),
            Some(format!("{} orders, net {}", totals.order_count, totals.net_total)),
        )
        .await?;
        db::commit(txn, "end_day.run", started).await?;

        info!(
            %end_day_id,
            orders = totals.order_count,
            net_total = %totals.net_total,
            "Day closed"
        );
        events::publish_all(
            self.event_sender.as_deref(),
            vec![Event::DayEnded {
                end_day_id,
                net_total: totals.net_total,
            }],
        )
        .await;

        Ok(EndDayRecord {
            end_day: marker,
            summary: Some(summary),
        })
    }

    pub async fn list(&self, page: u64, limit: u64) -> Result<(Vec<EndDayRecord>, u64), ServiceError> {
        let paginator = EndDayEntity::find()
            .find_also_related(SalesSummaryEntity)
            .order_by_desc(end_day::Column::EndDate)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count end days");
            ServiceError::DatabaseError(e)
        })?;
        let rows = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list end days");
                ServiceError::DatabaseError(e)
            })?;
        let records = rows
            .into_iter()
            .map(|(end_day, summary)| EndDayRecord { end_day, summary })
            .collect();
        Ok((records, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<EndDayRecord, ServiceError> {
        EndDayEntity::find_by_id(id)
            .find_also_related(SalesSummaryEntity)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, end_day_id = %id, "Failed to fetch end day");
                ServiceError::DatabaseError(e)
            })?
            .map(|(end_day, summary)| EndDayRecord { end_day, summary })
            .ok_or_else(|| ServiceError::NotFound(format!("End day {} not found", id)))
    }

    /// Most recent marker.
    pub async fn last(&self) -> Result<Option<EndDayRecord>, ServiceError> {
        let row = EndDayEntity::find()
            .find_also_related(SalesSummaryEntity)
            .order_by_desc(end_day::Column::EndDate)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch last end day");
                ServiceError::DatabaseError(e)
            })?;
        Ok(row.map(|(end_day, summary)| EndDayRecord { end_day, summary }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(status: OrderStatus, method: PaymentMethod, total: Decimal) -> order::Model {
        let now = Utc::now();
        order::Model {
            id: Uuid::new_v4(),
            order_number: "ORD-TEST".to_string(),
            user_id: None,
            customer_name: None,
            customer_phone: None,
            order_type: "Take Away".to_string(),
            payment_method: method.to_string(),
            discount_id: None,
            manual_discount_type: None,
            manual_discount_value: None,
            subtotal: total,
            discount_amount: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            service_charge: Decimal::ZERO,
            delivery_charges: Decimal::ZERO,
            total_amount: total,
            order_status: status.to_string(),
            payment_status: "Pending".to_string(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn cancelled_orders_are_counted_without_money() {
        let now = Utc::now();
        let orders = vec![
            order(OrderStatus::Completed, PaymentMethod::Cash, dec!(1035)),
            order(OrderStatus::Pending, PaymentMethod::Card, dec!(500)),
            order(OrderStatus::Cancelled, PaymentMethod::Cash, dec!(900)),
        ];
        let totals = summarize(now, now, &orders, dec!(200), dec!(100));

        assert_eq!(totals.order_count, 3);
        assert_eq!(totals.completed_orders, 1);
        assert_eq!(totals.pending_orders, 1);
        assert_eq!(totals.cancelled_orders, 1);
        assert_eq!(totals.gross_sales, dec!(1535));
        assert_eq!(totals.cash_sales, dec!(1035));
        assert_eq!(totals.card_sales, dec!(500));
        assert_eq!(totals.net_total, dec!(1235));
    }

    #[test]
    fn empty_period_nets_out_adjustments() {
        let now = Utc::now();
        let totals = summarize(now, now, &[], dec!(50), Decimal::ZERO);
        assert_eq!(totals.gross_sales, Decimal::ZERO);
        assert_eq!(totals.net_total, dec!(-50));
    }
}
