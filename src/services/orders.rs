use crate::{
    db::{self, DbPool},
    entities::discount::{self, DiscountType, Entity as DiscountEntity},
    entities::order::{
        self, Entity as OrderEntity, OrderStatus, OrderType, PaymentMethod, PaymentStatus,
    },
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::payment_transaction::{self, Entity as PaymentTransactionEntity, TransactionStatus},
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    events::{self, Event, EventSender},
    services::audit::{self, actions, RequestContext},
    services::discounts::{as_applied, evaluate_code, DiscountService},
    services::pricing::{compute_totals, AppliedDiscount, OrderTotals, PricedLine},
    services::settings::SettingsService,
    services::stock::{self, plan_stock_changes, StockChange, StockLine, MAX_LINE_QUANTITY},
};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Instant};
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 10000, message = "Quantity must be between 1 and 10000"))]
    pub quantity: i32,
    /// Overrides the catalog price when set
    #[validate(custom = "crate::entities::validate_positive")]
    pub unit_price: Option<Decimal>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Discount typed in at the till
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct ManualDiscountInput {
    pub discount_type: DiscountType,
    pub value: Decimal,
}

impl ManualDiscountInput {
    fn check(&self) -> Result<AppliedDiscount, ServiceError> {
        if self.value <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Discount value must be greater than zero".to_string(),
            ));
        }
        if self.discount_type == DiscountType::Percentage && self.value > dec!(100) {
            return Err(ServiceError::ValidationError(
                "Percentage discount cannot exceed 100".to_string(),
            ));
        }
        Ok(AppliedDiscount {
            discount_type: self.discount_type,
            value: self.value,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(max = 100))]
    pub customer_name: Option<String>,
    #[validate(length(max = 20))]
    pub customer_phone: Option<String>,
    pub order_type: OrderType,
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    #[validate]
    pub items: Vec<OrderItemInput>,
    pub discount_code: Option<String>,
    pub discount_id: Option<Uuid>,
    pub manual_discount: Option<ManualDiscountInput>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    #[validate(length(max = 100))]
    pub customer_name: Option<String>,
    #[validate(length(max = 20))]
    pub customer_phone: Option<String>,
    pub order_type: Option<OrderType>,
    pub payment_method: Option<PaymentMethod>,
    pub discount_code: Option<String>,
    pub manual_discount: Option<ManualDiscountInput>,
    /// Drops any linked or manual discount
    #[serde(default)]
    pub clear_discount: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateItemRequest {
    #[validate(range(min = 1, max = 10000, message = "Quantity must be between 1 and 10000"))]
    pub quantity: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MarkPaidRequest {
    /// Switches the payment method (and the tax rate) before settling
    pub payment_method: Option<PaymentMethod>,
    pub transaction_note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct OrderListFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Order with its lines and payments
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub payments: Vec<payment_transaction::Model>,
    /// Why a requested discount was not applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct StockCheckItem {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 10000, message = "Quantity must be between 1 and 10000"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockCheckResult {
    pub product_id: Uuid,
    pub name: Option<String>,
    pub requested: i32,
    pub available: i32,
    pub running_item: bool,
    pub sufficient: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn order_number() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("ORD-{}", &raw[..8])
}

fn transaction_number() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TXN-{}", &raw[..12])
}

fn parse_enum<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, ServiceError> {
    raw.parse().map_err(|_| {
        ServiceError::InternalError(format!("Stored {} '{}' is not recognised", what, raw))
    })
}

fn db_err(context: &'static str) -> impl Fn(sea_orm::DbErr) -> ServiceError {
    move |e| {
        error!(error = %e, "{}", context);
        ServiceError::DatabaseError(e)
    }
}

fn line_quantity(product: &str, current: i32, extra: i32) -> Result<i32, ServiceError> {
    current
        .checked_add(extra)
        .filter(|q| *q <= MAX_LINE_QUANTITY)
        .ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "Quantity for {} cannot exceed {} on one order",
                product, MAX_LINE_QUANTITY
            ))
        })
}

/// Sums duplicate product lines; the first line's price and notes win.
pub fn merge_lines(items: &[OrderItemInput]) -> Result<Vec<OrderItemInput>, ServiceError> {
    let mut merged: Vec<OrderItemInput> = Vec::with_capacity(items.len());
    for item in items {
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => {
                existing.quantity = line_quantity(
                    &existing.product_id.to_string(),
                    existing.quantity,
                    item.quantity,
                )?
            }
            None => merged.push(item.clone()),
        }
    }
    Ok(merged)
}

/// Discount picked for an order plus the warning when a requested one was dropped
#[derive(Debug, Default)]
struct DiscountChoice {
    discount_id: Option<Uuid>,
    manual: Option<AppliedDiscount>,
    warning: Option<String>,
}

#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    settings: SettingsService,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        settings: SettingsService,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            settings,
        }
    }

    async fn lock_order<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<order::Model, ServiceError> {
        OrderEntity::find_by_id(id)
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(db_err("Failed to lock order"))?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))
    }

    async fn lock_products<C: ConnectionTrait>(
        conn: &C,
        ids: Vec<Uuid>,
    ) -> Result<HashMap<Uuid, product::Model>, ServiceError> {
        let rows = ProductEntity::find()
            .filter(product::Column::Id.is_in(ids))
            .lock_exclusive()
            .all(conn)
            .await
            .map_err(db_err("Failed to lock products"))?;
        Ok(rows.into_iter().map(|p| (p.id, p)).collect())
    }

    async fn items_of<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(conn)
            .await
            .map_err(db_err("Failed to load order items"))
    }

    fn ensure_sellable(product: &product::Model) -> Result<(), ServiceError> {
        if !product.is_available || product.is_archived {
            return Err(ServiceError::ValidationError(format!(
                "Product '{}' is not available",
                product.name
            )));
        }
        Ok(())
    }

    fn ensure_pending(order: &order::Model) -> Result<(), ServiceError> {
        if !order.is_pending() {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is {}; items can only change while it is Pending",
                order.order_number, order.order_status
            )));
        }
        Ok(())
    }

    /// Writes stock deltas to the already locked products.
    async fn apply_stock<C: ConnectionTrait>(
        conn: &C,
        products: &HashMap<Uuid, product::Model>,
        changes: &[StockChange],
    ) -> Result<(), ServiceError> {
        for change in changes {
            let Some(product) = products.get(&change.product_id) else {
                continue;
            };
            let mut active = product.clone().into_active_model();
            active.stock_quantity = Set(change.new_quantity);
            active
                .update(conn)
                .await
                .map_err(db_err("Failed to update product stock"))?;
        }
        Ok(())
    }

    fn stock_events(
        products: &HashMap<Uuid, product::Model>,
        changes: &[StockChange],
        reason: &str,
        threshold: i32,
    ) -> Vec<Event> {
        let mut out = Vec::new();
        for change in changes {
            let Some(product) = products.get(&change.product_id) else {
                continue;
            };
            out.push(Event::StockAdjusted {
                product_id: change.product_id,
                old_quantity: product.stock_quantity,
                new_quantity: change.new_quantity,
                reason: reason.to_string(),
            });
            if change.delta < 0 && change.new_quantity < threshold {
                out.push(Event::LowStock {
                    product_id: change.product_id,
                    name: product.name.clone(),
                    stock_quantity: change.new_quantity,
                    threshold,
                });
            }
        }
        out
    }

    /// Resolves a code; invalid codes produce a warning instead of an error.
    async fn choose_by_code<C: ConnectionTrait>(
        conn: &C,
        code: &str,
    ) -> Result<DiscountChoice, ServiceError> {
        let code = code.trim();
        let found = DiscountService::find_by_code(conn, code).await?;
        let checked = evaluate_code(found, code, Utc::now().date_naive());
        match checked.discount {
            Some(d) if checked.valid => Ok(DiscountChoice {
                discount_id: Some(d.id),
                ..Default::default()
            }),
            _ => {
                let warning = checked
                    .message
                    .unwrap_or_else(|| format!("Discount code '{}' was not applied", code));
                warn!(code, warning = %warning, "Ignoring discount code");
                Ok(DiscountChoice {
                    warning: Some(warning),
                    ..Default::default()
                })
            }
        }
    }

    async fn choose_by_id<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<DiscountChoice, ServiceError> {
        let found = DiscountEntity::find_by_id(id)
            .one(conn)
            .await
            .map_err(db_err("Failed to load discount"))?;
        match found {
            Some(d) if d.is_valid_on(Utc::now().date_naive()) => Ok(DiscountChoice {
                discount_id: Some(d.id),
                ..Default::default()
            }),
            _ => Ok(DiscountChoice {
                warning: Some(format!("Discount {} is not valid and was not applied", id)),
                ..Default::default()
            }),
        }
    }

    async fn applied_discount<C: ConnectionTrait>(
        conn: &C,
        order: &order::Model,
    ) -> Result<Option<AppliedDiscount>, ServiceError> {
        if let Some(discount_id) = order.discount_id {
            let linked: Option<discount::Model> = DiscountEntity::find_by_id(discount_id)
                .one(conn)
                .await
                .map_err(db_err("Failed to load order discount"))?;
            return Ok(linked.as_ref().and_then(as_applied));
        }
        match (&order.manual_discount_type, order.manual_discount_value) {
            (Some(kind), Some(value)) => Ok(Some(AppliedDiscount {
                discount_type: parse_enum(kind, "discount type")?,
                value,
            })),
            _ => Ok(None),
        }
    }

    /// Recomputes and stores the totals of `order` from its current lines.
    async fn reprice<C: ConnectionTrait>(
        &self,
        conn: &C,
        order: order::Model,
    ) -> Result<(order::Model, OrderTotals), ServiceError> {
        let items = Self::items_of(conn, order.id).await?;
        let lines: Vec<PricedLine> = items
            .iter()
            .map(|i| PricedLine::new(i.quantity, i.unit_price))
            .collect();
        let discount = Self::applied_discount(conn, &order).await?;
        let policy = self.settings.pricing_policy_on(conn).await?;
        let totals = compute_totals(
            &lines,
            discount.as_ref(),
            parse_enum(&order.payment_method, "payment method")?,
            parse_enum(&order.order_type, "order type")?,
            &policy,
        )?;

        let mut active = order.into_active_model();
        active.subtotal = Set(totals.subtotal);
        active.discount_amount = Set(totals.discount_amount);
        active.tax_rate = Set(totals.tax_rate);
        active.tax_amount = Set(totals.tax_amount);
        active.service_charge = Set(totals.service_charge);
        active.delivery_charges = Set(totals.delivery_charge);
        active.total_amount = Set(totals.total);
        let saved = active
            .update(conn)
            .await
            .map_err(db_err("Failed to store order totals"))?;
        Ok((saved, totals))
    }

    async fn detail_on<C: ConnectionTrait>(
        conn: &C,
        order: order::Model,
        discount_warning: Option<String>,
    ) -> Result<OrderDetail, ServiceError> {
        let items = Self::items_of(conn, order.id).await?;
        let payments = PaymentTransactionEntity::find()
            .filter(payment_transaction::Column::OrderId.eq(order.id))
            .order_by_asc(payment_transaction::Column::CreatedAt)
            .all(conn)
            .await
            .map_err(db_err("Failed to load payments"))?;
        Ok(OrderDetail {
            order,
            items,
            payments,
            discount_warning,
        })
    }

    /// Creates an order, reserving stock for every non-running item.
    #[instrument(skip(self, request, ctx), fields(order_type = %request.order_type, items = request.items.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        ctx: &RequestContext,
    ) -> Result<OrderDetail, ServiceError> {
        request.validate()?;
        let manual = request.manual_discount.map(|m| m.check()).transpose()?;
        let lines = merge_lines(&request.items)?;

        let started = Instant::now();
        let txn = db::begin(&self.db_pool, "orders.create").await?;

        let products =
            Self::lock_products(&txn, lines.iter().map(|l| l.product_id).collect()).await?;
        let mut stock_lines = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = products.get(&line.product_id).ok_or_else(|| {
                ServiceError::ValidationError(format!("Product {} does not exist", line.product_id))
            })?;
            Self::ensure_sellable(product)?;
            stock_lines.push(StockLine {
                product_id: product.id,
                name: product.name.clone(),
                running_item: product.running_item,
                available: product.stock_quantity,
                old_quantity: 0,
                new_quantity: line.quantity,
            });
        }
        let changes = plan_stock_changes(&stock_lines)?;
        Self::apply_stock(&txn, &products, &changes).await?;

        let mut choice = match (&request.discount_code, request.discount_id) {
            (Some(code), _) if !code.trim().is_empty() => Self::choose_by_code(&txn, code).await?,
            (_, Some(id)) => Self::choose_by_id(&txn, id).await?,
            _ => DiscountChoice::default(),
        };
        if choice.discount_id.is_none() {
            choice.manual = manual;
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let number = order_number();
        let inserted = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(number.clone()),
            user_id: Set(ctx.user_id),
            customer_name: Set(request.customer_name),
            customer_phone: Set(request.customer_phone),
            order_type: Set(request.order_type.to_string()),
            payment_method: Set(request.payment_method.to_string()),
            discount_id: Set(choice.discount_id),
            manual_discount_type: Set(choice.manual.map(|m| m.discount_type.to_string())),
            manual_discount_value: Set(choice.manual.map(|m| m.value)),
            subtotal: Set(Decimal::ZERO),
            discount_amount: Set(Decimal::ZERO),
            tax_rate: Set(Decimal::ZERO),
            tax_amount: Set(Decimal::ZERO),
            service_charge: Set(Decimal::ZERO),
            delivery_charges: Set(Decimal::ZERO),
            total_amount: Set(Decimal::ZERO),
            order_status: Set(OrderStatus::Pending.to_string()),
            payment_status: Set(PaymentStatus::Pending.to_string()),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(db_err("Failed to insert order"))?;

        for line in &lines {
            let Some(product) = products.get(&line.product_id) else {
                continue;
            };
            let unit_price = line.unit_price.unwrap_or(product.price);
            if unit_price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "Product '{}' has no price; enter a unit price",
                    product.name
                )));
            }
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                product_name: Set(product.name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(unit_price),
                total_price: Set(PricedLine::new(line.quantity, unit_price).line_total()?),
                stock_deducted: Set(!product.running_item),
                notes: Set(line.notes.clone()),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(db_err("Failed to insert order item"))?;
        }

        let (saved, totals) = self.reprice(&txn, inserted).await?;
        let threshold = self.settings.low_stock_threshold_on(&txn).await?;
        audit::record(
            &txn,
            ctx,
            actions::ORDER_CREATE,
            "order",
            Some(order_id),
            Some(format!("{} total {}", number, totals.total)),
        )
        .await?;
        let detail = Self::detail_on(&txn, saved, choice.warning).await?;
        db::commit(txn, "orders.create", started).await?;

        info!(%order_id, order_number = %number, total = %totals.total, "Order created");
        let mut pending = vec![Event::OrderCreated(order_id)];
        pending.extend(Self::stock_events(
            &products,
            &changes,
            &format!("order {}", number),
            threshold,
        ));
        events::publish_all(self.event_sender.as_deref(), pending).await;

        Ok(detail)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, id: Uuid) -> Result<OrderDetail, ServiceError> {
        let db = &*self.db_pool;
        let order = OrderEntity::find_by_id(id)
            .one(db)
            .await
            .map_err(db_err("Failed to fetch order"))?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;
        Self::detail_on(db, order, None).await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filter: OrderListFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = OrderEntity::find();
        if let Some(status) = filter.status {
            query = query.filter(order::Column::OrderStatus.eq(status.to_string()));
        }
        if let Some(payment_status) = filter.payment_status {
            query = query.filter(order::Column::PaymentStatus.eq(payment_status.to_string()));
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(order::Column::OrderNumber.contains(term))
                    .add(order::Column::CustomerName.contains(term))
                    .add(order::Column::CustomerPhone.contains(term)),
            );
        }
        if let Some(from) = filter.date_from {
            query = query.filter(order::Column::CreatedAt.gte(from.and_time(NaiveTime::MIN).and_utc()));
        }
        if let Some(to) = filter.date_to {
            let end = (to + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();
            query = query.filter(order::Column::CreatedAt.lt(end));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator
            .num_items()
            .await
            .map_err(db_err("Failed to count orders"))?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(db_err("Failed to list orders"))?;
        Ok((orders, total))
    }

    /// Orders created since midnight UTC.
    pub async fn today(&self) -> Result<Vec<order::Model>, ServiceError> {
        let midnight = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        OrderEntity::find()
            .filter(order::Column::CreatedAt.gte(midnight))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(db_err("Failed to list today's orders"))
    }

    pub async fn by_status(&self, status: OrderStatus) -> Result<Vec<order::Model>, ServiceError> {
        OrderEntity::find()
            .filter(order::Column::OrderStatus.eq(status.to_string()))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(db_err("Failed to list orders by status"))
    }

    /// Changes customer details, notes, type, payment method or discount.
    #[instrument(skip(self, request, ctx))]
    pub async fn update_order(
        &self,
        id: Uuid,
        request: UpdateOrderRequest,
        ctx: &RequestContext,
    ) -> Result<OrderDetail, ServiceError> {
        request.validate()?;
        let manual = request.manual_discount.map(|m| m.check()).transpose()?;
        let reprices = request.order_type.is_some()
            || request.payment_method.is_some()
            || request.discount_code.is_some()
            || manual.is_some()
            || request.clear_discount;

        let started = Instant::now();
        let txn = db::begin(&self.db_pool, "orders.update").await?;
        let existing = Self::lock_order(&txn, id).await?;
        if existing.status() == Some(OrderStatus::Cancelled) {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is cancelled",
                existing.order_number
            )));
        }
        if reprices {
            Self::ensure_pending(&existing)?;
        }

        let mut warning = None;
        let mut active = existing.into_active_model();
        if let Some(name) = request.customer_name {
            active.customer_name = Set(Some(name));
        }
        if let Some(phone) = request.customer_phone {
            active.customer_phone = Set(Some(phone));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(order_type) = request.order_type {
            active.order_type = Set(order_type.to_string());
        }
        if let Some(method) = request.payment_method {
            active.payment_method = Set(method.to_string());
        }
        if request.clear_discount {
            active.discount_id = Set(None);
            active.manual_discount_type = Set(None);
            active.manual_discount_value = Set(None);
        }
        if let Some(code) = request.discount_code.as_deref().filter(|c| !c.trim().is_empty()) {
            let choice = Self::choose_by_code(&txn, code).await?;
            if let Some(discount_id) = choice.discount_id {
                active.discount_id = Set(Some(discount_id));
                active.manual_discount_type = Set(None);
                active.manual_discount_value = Set(None);
            }
            warning = choice.warning;
        } else if let Some(m) = manual {
            active.discount_id = Set(None);
            active.manual_discount_type = Set(Some(m.discount_type.to_string()));
            active.manual_discount_value = Set(Some(m.value));
        }

        let mut saved = active
            .update(&txn)
            .await
            .map_err(db_err("Failed to update order"))?;
        if reprices {
            saved = self.reprice(&txn, saved).await?.0;
        }
        audit::record(&txn, ctx, actions::ORDER_UPDATE, "order", Some(id), None).await?;
        let detail = Self::detail_on(&txn, saved, warning).await?;
        db::commit(txn, "orders.update", started).await?;

        events::publish_all(self.event_sender.as_deref(), vec![Event::OrderUpdated(id)]).await;
        Ok(detail)
    }

    /// Adds a product to a pending order, merging into an existing line for it.
    #[instrument(skip(self, item))]
    pub async fn add_item(&self, order_id: Uuid, item: OrderItemInput) -> Result<OrderDetail, ServiceError> {
        item.validate()?;
        let started = Instant::now();
        let txn = db::begin(&self.db_pool, "orders.add_item").await?;
        let order = Self::lock_order(&txn, order_id).await?;
        Self::ensure_pending(&order)?;

        let products = Self::lock_products(&txn, vec![item.product_id]).await?;
        let product = products.get(&item.product_id).ok_or_else(|| {
            ServiceError::ValidationError(format!("Product {} does not exist", item.product_id))
        })?;
        Self::ensure_sellable(product)?;

        let existing_line = Self::items_of(&txn, order_id)
            .await?
            .into_iter()
            .find(|i| i.product_id == item.product_id);
        let old_quantity = existing_line.as_ref().map(|l| l.quantity).unwrap_or(0);
        let new_quantity = line_quantity(&product.name, old_quantity, item.quantity)?;
        // an existing line keeps the stock mode it was created with
        let tracked = existing_line
            .as_ref()
            .map(|l| l.stock_deducted)
            .unwrap_or(!product.running_item);

        let changes = plan_stock_changes(&[StockLine {
            product_id: product.id,
            name: product.name.clone(),
            running_item: !tracked,
            available: product.stock_quantity,
            old_quantity,
            new_quantity,
        }])?;
        Self::apply_stock(&txn, &products, &changes).await?;

        match existing_line {
            Some(line) => {
                let unit_price = line.unit_price;
                let mut active = line.into_active_model();
                active.quantity = Set(new_quantity);
                active.total_price = Set(PricedLine::new(new_quantity, unit_price).line_total()?);
                active
                    .update(&txn)
                    .await
                    .map_err(db_err("Failed to update order item"))?;
            }
            None => {
                let unit_price = item.unit_price.unwrap_or(product.price);
                if unit_price <= Decimal::ZERO {
                    return Err(ServiceError::ValidationError(format!(
                        "Product '{}' has no price; enter a unit price",
                        product.name
                    )));
                }
                let now = Utc::now();
                order_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    product_id: Set(product.id),
                    product_name: Set(product.name.clone()),
                    quantity: Set(item.quantity),
                    unit_price: Set(unit_price),
                    total_price: Set(PricedLine::new(item.quantity, unit_price).line_total()?),
                    stock_deducted: Set(tracked),
                    notes: Set(item.notes.clone()),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await
                .map_err(db_err("Failed to insert order item"))?;
            }
        }

        let (saved, _) = self.reprice(&txn, order).await?;
        let threshold = self.settings.low_stock_threshold_on(&txn).await?;
        let detail = Self::detail_on(&txn, saved, None).await?;
        db::commit(txn, "orders.add_item", started).await?;

        let mut pending = vec![Event::OrderUpdated(order_id)];
        pending.extend(Self::stock_events(&products, &changes, "item added", threshold));
        events::publish_all(self.event_sender.as_deref(), pending).await;
        Ok(detail)
    }

    /// Sets a line's quantity; stock moves by the difference.
    #[instrument(skip(self, request))]
    pub async fn update_item(
        &self,
        order_id: Uuid,
        item_id: Uuid,
        request: UpdateItemRequest,
    ) -> Result<OrderDetail, ServiceError> {
        request.validate()?;
        let started = Instant::now();
        let txn = db::begin(&self.db_pool, "orders.update_item").await?;
        let order = Self::lock_order(&txn, order_id).await?;
        Self::ensure_pending(&order)?;
        let line = Self::find_line(&txn, order_id, item_id).await?;

        let products = Self::lock_products(&txn, vec![line.product_id]).await?;
        let changes = match products.get(&line.product_id) {
            Some(product) => plan_stock_changes(&[StockLine {
                product_id: product.id,
                name: product.name.clone(),
                running_item: !line.stock_deducted,
                available: product.stock_quantity,
                old_quantity: line.quantity,
                new_quantity: request.quantity,
            }])?,
            None => Vec::new(),
        };
        Self::apply_stock(&txn, &products, &changes).await?;

        let unit_price = line.unit_price;
        let mut active = line.into_active_model();
        active.quantity = Set(request.quantity);
        active.total_price = Set(PricedLine::new(request.quantity, unit_price).line_total()?);
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active
            .update(&txn)
            .await
            .map_err(db_err("Failed to update order item"))?;

        let (saved, _) = self.reprice(&txn, order).await?;
        let threshold = self.settings.low_stock_threshold_on(&txn).await?;
        let detail = Self::detail_on(&txn, saved, None).await?;
        db::commit(txn, "orders.update_item", started).await?;

        let mut pending = vec![Event::OrderUpdated(order_id)];
        pending.extend(Self::stock_events(&products, &changes, "item quantity changed", threshold));
        events::publish_all(self.event_sender.as_deref(), pending).await;
        Ok(detail)
    }

    /// Removes a line and gives its units back.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, order_id: Uuid, item_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let started = Instant::now();
        let txn = db::begin(&self.db_pool, "orders.remove_item").await?;
        let order = Self::lock_order(&txn, order_id).await?;
        Self::ensure_pending(&order)?;
        let line = Self::find_line(&txn, order_id, item_id).await?;

        let products = Self::lock_products(&txn, vec![line.product_id]).await?;
        let changes = Self::restore_plan(&products, std::slice::from_ref(&line))?;
        Self::apply_stock(&txn, &products, &changes).await?;

        OrderItemEntity::delete_by_id(item_id)
            .exec(&txn)
            .await
            .map_err(db_err("Failed to delete order item"))?;

        let (saved, _) = self.reprice(&txn, order).await?;
        let detail = Self::detail_on(&txn, saved, None).await?;
        db::commit(txn, "orders.remove_item", started).await?;

        let mut pending = vec![Event::OrderUpdated(order_id)];
        pending.extend(Self::stock_events(&products, &changes, "item removed", 0));
        events::publish_all(self.event_sender.as_deref(), pending).await;
        Ok(detail)
    }

    async fn find_line<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
        item_id: Uuid,
    ) -> Result<order_item::Model, ServiceError> {
        OrderItemEntity::find_by_id(item_id)
            .filter(order_item::Column::OrderId.eq(order_id))
            .one(conn)
            .await
            .map_err(db_err("Failed to fetch order item"))?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Item {} not found on order {}", item_id, order_id))
            })
    }

    /// Gives back exactly the units the lines took, whatever the product's
    /// running-item flag is now.
    fn restore_plan(
        products: &HashMap<Uuid, product::Model>,
        lines: &[order_item::Model],
    ) -> Result<Vec<StockChange>, ServiceError> {
        let merged = stock::merge_quantities(
            lines
                .iter()
                .filter(|l| l.stock_deducted)
                .map(|l| (l.product_id, l.quantity)),
        )?;
        let stock_lines: Vec<StockLine> = merged
            .into_iter()
            .filter_map(|(product_id, quantity)| {
                products.get(&product_id).map(|p| StockLine {
                    product_id,
                    name: p.name.clone(),
                    running_item: false,
                    available: p.stock_quantity,
                    old_quantity: quantity,
                    new_quantity: 0,
                })
            })
            .collect();
        plan_stock_changes(&stock_lines)
    }

    /// Cancels a pending order and restores its stock.
    #[instrument(skip(self, ctx))]
    pub async fn cancel_order(&self, id: Uuid, ctx: &RequestContext) -> Result<OrderDetail, ServiceError> {
        let started = Instant::now();
        let txn = db::begin(&self.db_pool, "orders.cancel").await?;
        let order = Self::lock_order(&txn, id).await?;
        match order.status() {
            Some(OrderStatus::Cancelled) => {
                return Err(ServiceError::ValidationError(format!(
                    "Order {} is already cancelled",
                    order.order_number
                )))
            }
            Some(OrderStatus::Completed) => {
                return Err(ServiceError::InvalidOperation(format!(
                    "Order {} is completed and cannot be cancelled",
                    order.order_number
                )))
            }
            _ => {}
        }
        if order.payment_status == PaymentStatus::Paid.to_string() {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is paid and cannot be cancelled",
                order.order_number
            )));
        }

        let lines = Self::items_of(&txn, id).await?;
        let products =
            Self::lock_products(&txn, lines.iter().map(|l| l.product_id).collect()).await?;
        let changes = Self::restore_plan(&products, &lines)?;
        Self::apply_stock(&txn, &products, &changes).await?;

        let number = order.order_number.clone();
        let mut active = order.into_active_model();
        active.order_status = Set(OrderStatus::Cancelled.to_string());
        let saved = active
            .update(&txn)
            .await
            .map_err(db_err("Failed to cancel order"))?;
        audit::record(&txn, ctx, actions::ORDER_CANCEL, "order", Some(id), Some(number.clone())).await?;
        let detail = Self::detail_on(&txn, saved, None).await?;
        db::commit(txn, "orders.cancel", started).await?;

        info!(order_id = %id, order_number = %number, restored = changes.len(), "Order cancelled");
        let mut pending = vec![Event::OrderCancelled(id)];
        pending.extend(Self::stock_events(
            &products,
            &changes,
            &format!("order {} cancelled", number),
            0,
        ));
        events::publish_all(self.event_sender.as_deref(), pending).await;
        Ok(detail)
    }

    /// Settles an order and records the payment.
    #[instrument(skip(self, request, ctx))]
    pub async fn mark_paid(
        &self,
        id: Uuid,
        request: MarkPaidRequest,
        ctx: &RequestContext,
    ) -> Result<OrderDetail, ServiceError> {
        let started = Instant::now();
        let txn = db::begin(&self.db_pool, "orders.pay").await?;
        let mut order = Self::lock_order(&txn, id).await?;
        if order.status() == Some(OrderStatus::Cancelled) {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is cancelled and cannot be paid",
                order.order_number
            )));
        }
        if order.payment_status == PaymentStatus::Paid.to_string() {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is already paid",
                order.order_number
            )));
        }

        if let Some(method) = request.payment_method {
            if method.to_string() != order.payment_method && order.is_pending() {
                let mut active = order.into_active_model();
                active.payment_method = Set(method.to_string());
                let switched = active
                    .update(&txn)
                    .await
                    .map_err(db_err("Failed to switch payment method"))?;
                order = self.reprice(&txn, switched).await?.0;
            }
        }

        let now = Utc::now();
        payment_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(id),
            transaction_number: Set(transaction_number()),
            amount: Set(order.total_amount),
            payment_method: Set(order.payment_method.clone()),
            transaction_status: Set(TransactionStatus::Completed.to_string()),
            transaction_note: Set(request.transaction_note),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(db_err("Failed to record payment"))?;

        let number = order.order_number.clone();
        let amount = order.total_amount;
        let mut active = order.into_active_model();
        active.payment_status = Set(PaymentStatus::Paid.to_string());
        let saved = active
            .update(&txn)
            .await
            .map_err(db_err("Failed to mark order paid"))?;
        audit::record(
            &txn,
            ctx,
            actions::ORDER_PAY,
            "order",
            Some(id),
            Some(format!("{} paid {}", number, amount)),
        )
        .await?;
        let detail = Self::detail_on(&txn, saved, None).await?;
        db::commit(txn, "orders.pay", started).await?;

        info!(order_id = %id, %amount, "Order paid");
        events::publish_all(self.event_sender.as_deref(), vec![Event::OrderPaid(id)]).await;
        Ok(detail)
    }

    /// Completes a paid order.
    #[instrument(skip(self, ctx))]
    pub async fn complete_order(&self, id: Uuid, ctx: &RequestContext) -> Result<OrderDetail, ServiceError> {
        let started = Instant::now();
        let txn = db::begin(&self.db_pool, "orders.complete").await?;
        let order = Self::lock_order(&txn, id).await?;
        match order.status() {
            Some(OrderStatus::Cancelled) => {
                return Err(ServiceError::InvalidOperation(format!(
                    "Order {} is cancelled",
                    order.order_number
                )))
            }
            Some(OrderStatus::Completed) => {
                return Err(ServiceError::InvalidOperation(format!(
                    "Order {} is already completed",
                    order.order_number
                )))
            }
            _ => {}
        }
        if order.payment_status != PaymentStatus::Paid.to_string() {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} must be paid before it can be completed",
                order.order_number
            )));
        }

        let mut active = order.into_active_model();
        active.order_status = Set(OrderStatus::Completed.to_string());
        let saved = active
            .update(&txn)
            .await
            .map_err(db_err("Failed to complete order"))?;
        audit::record(&txn, ctx, actions::ORDER_COMPLETE, "order", Some(id), None).await?;
        let detail = Self::detail_on(&txn, saved, None).await?;
        db::commit(txn, "orders.complete", started).await?;

        events::publish_all(self.event_sender.as_deref(), vec![Event::OrderCompleted(id)]).await;
        Ok(detail)
    }

    /// Orders are never removed; deleting cancels.
    pub async fn delete_order(&self, id: Uuid, ctx: &RequestContext) -> Result<OrderDetail, ServiceError> {
        self.cancel_order(id, ctx).await
    }

    /// Reports, per product, whether the requested quantity can be sold.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn check_stock(&self, items: Vec<StockCheckItem>) -> Result<Vec<StockCheckResult>, ServiceError> {
        for item in &items {
            item.validate()?;
        }
        let requested = stock::merge_quantities(items.iter().map(|i| (i.product_id, i.quantity)))?;
        let ids: Vec<Uuid> = requested.keys().copied().collect();
        let products: HashMap<Uuid, product::Model> = ProductEntity::find()
            .filter(product::Column::Id.is_in(ids))
            .all(&*self.db_pool)
            .await
            .map_err(db_err("Failed to load products for stock check"))?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(requested
            .into_iter()
            .map(|(product_id, quantity)| match products.get(&product_id) {
                None => StockCheckResult {
                    product_id,
                    name: None,
                    requested: quantity,
                    available: 0,
                    running_item: false,
                    sufficient: false,
                    message: Some("Product does not exist".to_string()),
                },
                Some(p) => {
                    let sellable = p.is_available && !p.is_archived;
                    let enough = p.running_item || quantity <= p.stock_quantity;
                    let message = if !sellable {
                        Some(format!("Product '{}' is not available", p.name))
                    } else if !enough {
                        Some(format!(
                            "Insufficient stock for {}: requested {}, available {}",
                            p.name, quantity, p.stock_quantity
                        ))
                    } else {
                        None
                    };
                    StockCheckResult {
                        product_id,
                        name: Some(p.name.clone()),
                        requested: quantity,
                        available: p.stock_quantity,
                        running_item: p.running_item,
                        sufficient: sellable && enough,
                        message,
                    }
                }
            })
            .collect())
    }
}
