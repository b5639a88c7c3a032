use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::discount,
    errors::ServiceError,
    handlers::common::{created, no_content_response, AppJson},
    services::discounts::{CreateDiscountRequest, DiscountValidation, UpdateDiscountRequest},
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidateDiscountRequest {
    pub code: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/discounts",
    summary = "List discounts",
    params(ListQuery),
    responses((status = 200, description = "Discounts", body = ApiResponse<PaginatedResponse<discount::Model>>)),
    security(("Bearer" = [])),
    tag = "discounts"
)]
pub async fn list_discounts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<discount::Model>> {
    let limit = state.page_limit(query.limit);
    let (items, total) = state
        .services
        .discounts
        .list(query.search, query.page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, query.page, limit,
    ))))
}

/// Active discounts valid today
#[utoipa::path(
    get,
    path = "/api/v1/discounts/active",
    summary = "List usable discounts",
    responses((status = 200, description = "Discounts usable today", body = ApiResponse<Vec<discount::Model>>)),
    security(("Bearer" = [])),
    tag = "discounts"
)]
pub async fn list_active_discounts(State(state): State<AppState>) -> ApiResult<Vec<discount::Model>> {
    let discounts = state.services.discounts.list_active().await?;
    Ok(Json(ApiResponse::success(discounts)))
}

#[utoipa::path(
    get,
    path = "/api/v1/discounts/{id}",
    summary = "Get discount",
    params(("id" = Uuid, Path, description = "Discount id")),
    responses(
        (status = 200, description = "Discount", body = ApiResponse<discount::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "discounts"
)]
pub async fn get_discount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<discount::Model> {
    let discount = state.services.discounts.get(id).await?;
    Ok(Json(ApiResponse::success(discount)))
}

/// Checks a code; an unusable code is reported with `valid = false`, not an error
#[utoipa::path(
    post,
    path = "/api/v1/discounts/validate",
    summary = "Validate discount code",
    request_body = ValidateDiscountRequest,
    responses((status = 200, description = "Validation result", body = ApiResponse<DiscountValidation>)),
    security(("Bearer" = [])),
    tag = "discounts"
)]
pub async fn validate_discount(
    State(state): State<AppState>,
    AppJson(request): AppJson<ValidateDiscountRequest>,
) -> ApiResult<DiscountValidation> {
    let result = state.services.discounts.validate_code(&request.code).await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    post,
    path = "/api/v1/discounts",
    summary = "Create discount",
    request_body = CreateDiscountRequest,
    responses(
        (status = 201, description = "Discount created", body = ApiResponse<discount::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already used", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "discounts"
)]
pub async fn create_discount(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateDiscountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<discount::Model>>), ServiceError> {
    let discount = state.services.discounts.create(request).await?;
    Ok(created(discount))
}

#[utoipa::path(
    put,
    path = "/api/v1/discounts/{id}",
    summary = "Update discount",
    params(("id" = Uuid, Path, description = "Discount id")),
    request_body = UpdateDiscountRequest,
    responses(
        (status = 200, description = "Discount updated", body = ApiResponse<discount::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "discounts"
)]
pub async fn update_discount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<UpdateDiscountRequest>,
) -> ApiResult<discount::Model> {
    let discount = state.services.discounts.update(id, request).await?;
    Ok(Json(ApiResponse::success(discount)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/discounts/{id}",
    summary = "Delete discount",
    params(("id" = Uuid, Path, description = "Discount id")),
    responses(
        (status = 204, description = "Discount deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "discounts"
)]
pub async fn delete_discount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.discounts.delete(id).await?;
    Ok(no_content_response())
}
