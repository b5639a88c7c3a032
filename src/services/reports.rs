use crate::{
    db::DbPool,
    entities::category::{self, Entity as CategoryEntity},
    entities::order::{self, Entity as OrderEntity, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    services::products::ProductService,
    services::settings::SettingsService,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{error, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Order count and revenue over a period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PeriodStat {
    pub orders: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub today: PeriodStat,
    pub last_7_days: PeriodStat,
    pub last_30_days: PeriodStat,
    pub all_time: PeriodStat,
    pub low_stock_count: u64,
    pub pending_orders: u64,
}

/// Named report ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
pub enum RangePreset {
    #[serde(rename = "7days")]
    #[strum(serialize = "7days")]
    Last7Days,
    #[serde(rename = "30days")]
    #[strum(serialize = "30days")]
    Last30Days,
    #[serde(rename = "this_month")]
    #[strum(serialize = "this_month")]
    ThisMonth,
    #[serde(rename = "last_month")]
    #[strum(serialize = "last_month")]
    LastMonth,
    #[serde(rename = "this_year")]
    #[strum(serialize = "this_year")]
    ThisYear,
    #[serde(rename = "custom")]
    #[strum(serialize = "custom")]
    Custom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct SalesReportQuery {
    /// Defaults to `30days`
    pub range: Option<RangePreset>,
    /// Required with `custom`
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub group_by: GroupBy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SalesBucket {
    pub period: String,
    pub orders: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SalesReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub group_by: GroupBy,
    pub buckets: Vec<SalesBucket>,
    pub total_orders: u64,
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub quantity_sold: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CategorySales {
    pub category_id: Option<Uuid>,
    pub name: String,
    pub quantity_sold: i64,
    pub revenue: Decimal,
}

/// Inclusive date range for a preset, relative to `today`.
pub fn resolve_range(
    preset: RangePreset,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), ServiceError> {
    let invalid = || ServiceError::InternalError("Could not resolve report range".to_string());
    let range = match preset {
        RangePreset::Last7Days => (today - Duration::days(6), today),
        RangePreset::Last30Days => (today - Duration::days(29), today),
        RangePreset::ThisMonth => (today.with_day(1).ok_or_else(invalid)?, today),
        RangePreset::LastMonth => {
            let first_this = today.with_day(1).ok_or_else(invalid)?;
            let last_prev = first_this - Duration::days(1);
            (last_prev.with_day(1).ok_or_else(invalid)?, last_prev)
        }
        RangePreset::ThisYear => (
            NaiveDate::from_ymd_opt(today.year(), 1, 1).ok_or_else(invalid)?,
            today,
        ),
        RangePreset::Custom => match (start, end) {
            (Some(s), Some(e)) => (s, e),
            _ => {
                return Err(ServiceError::ValidationError(
                    "A custom range needs start_date and end_date".to_string(),
                ))
            }
        },
    };
    if range.0 > range.1 {
        return Err(ServiceError::ValidationError(
            "start_date must not be after end_date".to_string(),
        ));
    }
    Ok(range)
}

/// Label of the bucket `date` falls in.
pub fn bucket_key(date: NaiveDate, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::Day => date.format("%Y-%m-%d").to_string(),
        GroupBy::Week => {
            let week = date.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        GroupBy::Month => date.format("%Y-%m").to_string(),
    }
}

/// Buckets non-cancelled orders by creation date, oldest first.
pub fn group_sales(orders: &[order::Model], group_by: GroupBy) -> Vec<SalesBucket> {
    let mut buckets: BTreeMap<String, (u64, Decimal)> = BTreeMap::new();
    for order in orders {
        if order.status() == Some(OrderStatus::Cancelled) {
            continue;
        }
        let entry = buckets
            .entry(bucket_key(order.created_at.date_naive(), group_by))
            .or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += order.total_amount;
    }
    buckets
        .into_iter()
        .map(|(period, (orders, revenue))| SalesBucket {
            period,
            orders,
            revenue,
        })
        .collect()
}

/// Ranks products by units sold, then by revenue.
pub fn rank_products(items: &[order_item::Model], limit: usize) -> Vec<TopProduct> {
    let mut totals: HashMap<Uuid, TopProduct> = HashMap::new();
    for item in items {
        let entry = totals.entry(item.product_id).or_insert_with(|| TopProduct {
            product_id: item.product_id,
            name: item.product_name.clone(),
            quantity_sold: 0,
            revenue: Decimal::ZERO,
        });
        entry.quantity_sold += i64::from(item.quantity);
        entry.revenue += item.total_price;
    }
    let mut ranked: Vec<TopProduct> = totals.into_values().collect();
    ranked.sort_by(|a, b| {
        b.quantity_sold
            .cmp(&a.quantity_sold)
            .then(b.revenue.cmp(&a.revenue))
            .then(a.name.cmp(&b.name))
    });
    ranked.truncate(limit);
    ranked
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
    products: ProductService,
    settings: SettingsService,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>, products: ProductService, settings: SettingsService) -> Self {
        Self {
            db_pool,
            products,
            settings,
        }
    }

    async fn period_stat(&self, since: Option<DateTime<Utc>>) -> Result<PeriodStat, ServiceError> {
        let mut query = OrderEntity::find()
            .filter(order::Column::OrderStatus.ne(OrderStatus::Cancelled.to_string()));
        if let Some(since) = since {
            query = query.filter(order::Column::CreatedAt.gte(since));
        }
        let orders = query.clone().count(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to count orders for dashboard");
            ServiceError::DatabaseError(e)
        })?;
        let revenue = query
            .select_only()
            .column_as(order::Column::TotalAmount.sum(), "revenue")
            .into_tuple::<Option<Decimal>>()
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to sum revenue for dashboard");
                ServiceError::DatabaseError(e)
            })?
            .flatten()
            .unwrap_or_default();
        Ok(PeriodStat { orders, revenue })
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<DashboardStats, ServiceError> {
        let today = Utc::now().date_naive();
        let threshold = self.settings.low_stock_threshold().await?;
        let pending_orders = OrderEntity::find()
            .filter(order::Column::OrderStatus.eq(OrderStatus::Pending.to_string()))
            .count(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to count pending orders");
                ServiceError::DatabaseError(e)
            })?;

        Ok(DashboardStats {
            today: self.period_stat(Some(start_of(today))).await?,
            last_7_days: self
                .period_stat(Some(start_of(today - Duration::days(6))))
                .await?,
            last_30_days: self
                .period_stat(Some(start_of(today - Duration::days(29))))
                .await?,
            all_time: self.period_stat(None).await?,
            low_stock_count: self.products.count_low_stock(threshold).await?,
            pending_orders,
        })
    }

    async fn orders_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<order::Model>, ServiceError> {
        OrderEntity::find()
            .filter(order::Column::CreatedAt.gte(start_of(start)))
            .filter(order::Column::CreatedAt.lt(start_of(end + Duration::days(1))))
            .filter(order::Column::OrderStatus.ne(OrderStatus::Cancelled.to_string()))
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load orders for report");
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self))]
    pub async fn sales_report(&self, query: SalesReportQuery) -> Result<SalesReport, ServiceError> {
        let (start_date, end_date) = resolve_range(
            query.range.unwrap_or(RangePreset::Last30Days),
            query.start_date,
            query.end_date,
            Utc::now().date_naive(),
        )?;
        let orders = self.orders_between(start_date, end_date).await?;
        let buckets = group_sales(&orders, query.group_by);
        Ok(SalesReport {
            start_date,
            end_date,
            group_by: query.group_by,
            total_orders: buckets.iter().map(|b| b.orders).sum(),
            total_revenue: buckets.iter().map(|b| b.revenue).sum(),
            buckets,
        })
    }

    /// Best sellers across completed orders.
    #[instrument(skip(self))]
    pub async fn top_products(&self, limit: usize) -> Result<Vec<TopProduct>, ServiceError> {
        let items: Vec<order_item::Model> = OrderEntity::find()
            .filter(order::Column::OrderStatus.eq(OrderStatus::Completed.to_string()))
            .find_with_related(OrderItemEntity)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load completed orders");
                ServiceError::DatabaseError(e)
            })?
            .into_iter()
            .flat_map(|(_, items)| items)
            .collect();
        Ok(rank_products(&items, limit))
    }

    /// Units and revenue per category over non-cancelled orders.
    #[instrument(skip(self))]
    pub async fn category_sales(&self) -> Result<Vec<CategorySales>, ServiceError> {
        let db = &*self.db_pool;
        let items: Vec<order_item::Model> = OrderEntity::find()
            .filter(order::Column::OrderStatus.ne(OrderStatus::Cancelled.to_string()))
            .find_with_related(OrderItemEntity)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load orders for category sales");
                ServiceError::DatabaseError(e)
            })?
            .into_iter()
            .flat_map(|(_, items)| items)
            .collect();

        let product_category: HashMap<Uuid, Uuid> = ProductEntity::find()
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load products for category sales");
                ServiceError::DatabaseError(e)
            })?
            .into_iter()
            .map(|p: product::Model| (p.id, p.category_id))
            .collect();
        let names: HashMap<Uuid, String> = CategoryEntity::find()
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load categories");
                ServiceError::DatabaseError(e)
            })?
            .into_iter()
            .map(|c: category::Model| (c.id, c.name))
            .collect();

        let mut totals: HashMap<Option<Uuid>, (i64, Decimal)> = HashMap::new();
        for item in &items {
            let category_id = product_category.get(&item.product_id).copied();
            let entry = totals.entry(category_id).or_insert((0, Decimal::ZERO));
            entry.0 += i64::from(item.quantity);
            entry.1 += item.total_price;
        }

        let mut rows: Vec<CategorySales> = totals
            .into_iter()
            .map(|(category_id, (quantity_sold, revenue))| CategorySales {
                category_id,
                name: category_id
                    .and_then(|id| names.get(&id).cloned())
                    .unwrap_or_else(|| "Uncategorised".to_string()),
                quantity_sold,
                revenue,
            })
            .collect();
        rows.sort_by(|a, b| b.revenue.cmp(&a.revenue).then(a.name.cmp(&b.name)));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(RangePreset::Last7Days, day(2024, 3, 9), day(2024, 3, 15))]
    #[case(RangePreset::ThisMonth, day(2024, 3, 1), day(2024, 3, 15))]
    #[case(RangePreset::LastMonth, day(2024, 2, 1), day(2024, 2, 29))]
    #[case(RangePreset::ThisYear, day(2024, 1, 1), day(2024, 3, 15))]
    fn presets_resolve_relative_to_today(
        #[case] preset: RangePreset,
        #[case] start: NaiveDate,
        #[case] end: NaiveDate,
    ) {
        let range = resolve_range(preset, None, None, day(2024, 3, 15)).unwrap();
        assert_eq!(range, (start, end));
    }

    #[test]
    fn last_month_wraps_the_year() {
        let range = resolve_range(RangePreset::LastMonth, None, None, day(2024, 1, 10)).unwrap();
        assert_eq!(range, (day(2023, 12, 1), day(2023, 12, 31)));
    }

    #[test]
    fn custom_range_needs_both_dates() {
        assert!(resolve_range(RangePreset::Custom, Some(day(2024, 1, 1)), None, day(2024, 3, 1)).is_err());
        assert!(resolve_range(
            RangePreset::Custom,
            Some(day(2024, 2, 1)),
            Some(day(2024, 1, 1)),
            day(2024, 3, 1)
        )
        .is_err());
    }

    #[test]
    fn preset_names_parse() {
        assert_eq!("7days".parse::<RangePreset>().unwrap(), RangePreset::Last7Days);
        let parsed: RangePreset = serde_json::from_str("\"last_month\"").unwrap();
        assert_eq!(parsed, RangePreset::LastMonth);
    }

    #[test]
    fn bucket_labels() {
        assert_eq!(bucket_key(day(2024, 3, 15), GroupBy::Day), "2024-03-15");
        assert_eq!(bucket_key(day(2024, 3, 15), GroupBy::Month), "2024-03");
        assert_eq!(bucket_key(day(2024, 12, 30), GroupBy::Week), "2025-W01");
    }

    fn item(product_id: Uuid, name: &str, quantity: i32, total: Decimal) -> order_item::Model {
        let now = Utc::now();
        order_item::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id,
            product_name: name.to_string(),
            quantity,
            unit_price: total / Decimal::from(quantity),
            total_price: total,
            stock_deducted: true,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn ranking_sums_quantities_across_orders() {
        let tea = Uuid::new_v4();
        let naan = Uuid::new_v4();
        let items = vec![
            item(tea, "Tea", 2, dec!(100)),
            item(naan, "Naan", 3, dec!(60)),
            item(tea, "Tea", 2, dec!(100)),
        ];
        let ranked = rank_products(&items, 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].name, "Tea");
        assert_eq!(ranked[0].quantity_sold, 4);
        assert_eq!(ranked[0].revenue, dec!(200));
    }
}
