//! Compact endpoints for the till screen.

use axum::{extract::State, http::StatusCode, response::Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    handlers::common::AppJson,
    handlers::discounts::ValidateDiscountRequest,
    services::audit::RequestContext,
    services::discounts::DiscountValidation,
    services::orders::{CreateOrderRequest, OrderDetail, StockCheckItem, StockCheckResult},
    ApiResponse, ApiResult, AppState,
};

/// What the till needs back after ringing up an order
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PosOrderResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub service_charge: Decimal,
    pub delivery_charges: Decimal,
    pub total_amount: Decimal,
    pub order_status: String,
    pub payment_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_warning: Option<String>,
}

impl From<OrderDetail> for PosOrderResponse {
    fn from(detail: OrderDetail) -> Self {
        let order = detail.order;
        Self {
            order_id: order.id,
            order_number: order.order_number,
            subtotal: order.subtotal,
            discount_amount: order.discount_amount,
            tax_amount: order.tax_amount,
            service_charge: order.service_charge,
            delivery_charges: order.delivery_charges,
            total_amount: order.total_amount,
            order_status: order.order_status,
            payment_status: order.payment_status,
            discount_warning: detail.discount_warning,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockCheckRequest {
    pub items: Vec<StockCheckItem>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StockCheckResponse {
    pub all_available: bool,
    pub items: Vec<StockCheckResult>,
}

#[utoipa::path(
    post,
    path = "/api/v1/pos/orders",
    summary = "Ring up an order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<PosOrderResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "pos"
)]
pub async fn create_order(
    State(state): State<AppState>,
    ctx: RequestContext,
    AppJson(request): AppJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PosOrderResponse>>), ServiceError> {
    let detail = state.services.orders.create_order(request, &ctx).await?;
    let order_number = detail.order.order_number.clone();
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            PosOrderResponse::from(detail),
            format!("Order {} created", order_number),
        )),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/pos/discounts/validate",
    summary = "Validate a discount code at the till",
    request_body = ValidateDiscountRequest,
    responses((status = 200, description = "Validation result", body = ApiResponse<DiscountValidation>)),
    security(("Bearer" = [])),
    tag = "pos"
)]
pub async fn validate_discount(
    State(state): State<AppState>,
    AppJson(request): AppJson<ValidateDiscountRequest>,
) -> ApiResult<DiscountValidation> {
    let result = state.services.discounts.validate_code(&request.code).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// Reports availability per line without reserving anything
#[utoipa::path(
    post,
    path = "/api/v1/pos/stock/check",
    summary = "Check stock for a basket",
    request_body = StockCheckRequest,
    responses(
        (status = 200, description = "Availability per line", body = ApiResponse<StockCheckResponse>),
        (status = 400, description = "Empty basket", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "pos"
)]
pub async fn check_stock(
    State(state): State<AppState>,
    AppJson(request): AppJson<StockCheckRequest>,
) -> ApiResult<StockCheckResponse> {
    if request.items.is_empty() {
        return Err(ServiceError::ValidationError(
            "No items to check".to_string(),
        ));
    }
    let items = state.services.orders.check_stock(request.items).await?;
    let all_available = items.iter().all(|i| i.sufficient);
    Ok(Json(ApiResponse::success(StockCheckResponse {
        all_available,
        items,
    })))
}
