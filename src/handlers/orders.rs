use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    entities::order::{self, OrderStatus},
    errors::ServiceError,
    handlers::common::{created, AppJson},
    services::audit::RequestContext,
    services::orders::{
        CreateOrderRequest, MarkPaidRequest, OrderDetail, OrderItemInput, OrderListFilter,
        UpdateItemRequest, UpdateOrderRequest,
    },
    services::receipts::Receipt,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default)]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn with_warning(detail: OrderDetail) -> ApiResponse<OrderDetail> {
    match detail.discount_warning.clone() {
        Some(warning) => ApiResponse::success_with_message(detail, warning),
        None => ApiResponse::success(detail),
    }
}

/// List orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "Newest first, filtered by status, payment status, search term and date range",
    params(PageQuery, OrderListFilter),
    responses(
        (status = 200, description = "Orders", body = ApiResponse<PaginatedResponse<order::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<OrderListFilter>,
) -> ApiResult<PaginatedResponse<order::Model>> {
    let limit = state.page_limit(page.limit);
    let (orders, total) = state
        .services
        .orders
        .list_orders(filter, page.page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        orders, total, page.page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/today",
    summary = "Today's orders",
    responses((status = 200, description = "Orders since midnight UTC", body = ApiResponse<Vec<order::Model>>)),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn list_today_orders(State(state): State<AppState>) -> ApiResult<Vec<order::Model>> {
    let orders = state.services.orders.today().await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/status/{status}",
    summary = "Orders by status",
    params(("status" = OrderStatus, Path, description = "Pending, Completed or Cancelled")),
    responses(
        (status = 200, description = "Orders", body = ApiResponse<Vec<order::Model>>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn list_orders_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> ApiResult<Vec<order::Model>> {
    let status: OrderStatus = status
        .parse()
        .map_err(|_| ServiceError::InvalidInput(format!("Unknown order status '{}'", status)))?;
    let orders = state.services.orders.by_status(status).await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items and payments", body = ApiResponse<OrderDetail>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let detail = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Create a new order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Prices the order, applies any discount and decrements stock in one transaction",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = ApiResponse<OrderDetail>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    AppJson(request): AppJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetail>>), ServiceError> {
    let detail = state.services.orders.create_order(request, &ctx).await?;
    Ok((StatusCode::CREATED, Json(with_warning(detail))))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    summary = "Update order",
    description = "Customer details, notes, type, payment method or discount; totals are recomputed",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<OrderDetail>),
        (status = 400, description = "Order is not pending", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<UpdateOrderRequest>,
) -> ApiResult<OrderDetail> {
    let detail = state.services.orders.update_order(id, request, &ctx).await?;
    Ok(Json(with_warning(detail)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/items",
    summary = "Add order item",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = OrderItemInput,
    responses(
        (status = 201, description = "Item added", body = ApiResponse<OrderDetail>),
        (status = 400, description = "Order is not pending", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn add_order_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(item): AppJson<OrderItemInput>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetail>>), ServiceError> {
    let detail = state.services.orders.add_item(id, item).await?;
    Ok(created(detail))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/items/{item_id}",
    summary = "Change item quantity",
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("item_id" = Uuid, Path, description = "Order item id"),
    ),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Item updated", body = ApiResponse<OrderDetail>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn update_order_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    AppJson(request): AppJson<UpdateItemRequest>,
) -> ApiResult<OrderDetail> {
    let detail = state
        .services
        .orders
        .update_item(id, item_id, request)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}/items/{item_id}",
    summary = "Remove order item",
    description = "Returns the line's stock and reprices the order",
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("item_id" = Uuid, Path, description = "Order item id"),
    ),
    responses(
        (status = 200, description = "Item removed", body = ApiResponse<OrderDetail>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn remove_order_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<OrderDetail> {
    let detail = state.services.orders.remove_item(id, item_id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    summary = "Cancel order",
    description = "Restores stock for every tracked item",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<OrderDetail>),
        (status = 400, description = "Already cancelled or completed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let detail = state.services.orders.cancel_order(id, &ctx).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Deleting an order cancels it so stock and history stay consistent
#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    summary = "Delete order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<OrderDetail>),
        (status = 400, description = "Already cancelled or completed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let detail = state.services.orders.delete_order(id, &ctx).await?;
    Ok(Json(ApiResponse::success_with_message(detail, "Order cancelled")))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/pay",
    summary = "Mark order paid",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = MarkPaidRequest,
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<OrderDetail>),
        (status = 400, description = "Already paid or cancelled", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn pay_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    request: Option<AppJson<MarkPaidRequest>>,
) -> ApiResult<OrderDetail> {
    let request = request.map(|AppJson(r)| r).unwrap_or_default();
    let detail = state.services.orders.mark_paid(id, request, &ctx).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/complete",
    summary = "Complete order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order completed", body = ApiResponse<OrderDetail>),
        (status = 400, description = "Order is not paid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn complete_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let detail = state.services.orders.complete_order(id, &ctx).await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/receipt",
    summary = "Order receipt",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Receipt", body = ApiResponse<Receipt>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Receipt> {
    let receipt = state.services.receipts.receipt(id).await?;
    Ok(Json(ApiResponse::success(receipt)))
}

/// Fixed-width text for thermal printers
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/receipt.txt",
    summary = "Printable receipt",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Receipt text", body = String, content_type = "text/plain"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_receipt_text(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let receipt = state.services.receipts.receipt(id).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        receipt.render_text(),
    )
        .into_response())
}
