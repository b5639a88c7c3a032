use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Json, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    entities::category,
    errors::ServiceError,
    handlers::common::{created, no_content_response, AppJson},
    services::categories::{CreateCategoryRequest, UpdateCategoryRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct CategoryListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default)]
    pub limit: u64,
    pub search: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

fn default_page() -> u64 {
    1
}

/// List categories
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    summary = "List categories",
    params(CategoryListQuery),
    responses(
        (status = 200, description = "Categories", body = ApiResponse<PaginatedResponse<category::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<CategoryListQuery>,
) -> ApiResult<PaginatedResponse<category::Model>> {
    let limit = state.page_limit(query.limit);
    let (items, total) = state
        .services
        .categories
        .list(query.search, query.active_only, query.page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, query.page, limit,
    ))))
}

/// Active categories in till order
#[utoipa::path(
    get,
    path = "/api/v1/categories/active",
    summary = "List active categories",
    responses((status = 200, description = "Active categories", body = ApiResponse<Vec<category::Model>>)),
    security(("Bearer" = [])),
    tag = "categories"
)]
pub async fn list_active_categories(State(state): State<AppState>) -> ApiResult<Vec<category::Model>> {
    let categories = state.services.categories.list_active().await?;
    Ok(Json(ApiResponse::success(categories)))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    summary = "Get category",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category", body = ApiResponse<category::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<category::Model> {
    let category = state.services.categories.get(id).await?;
    Ok(Json(ApiResponse::success(category)))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    summary = "Create category",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<category::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already used", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<category::Model>>), ServiceError> {
    let category = state.services.categories.create(request).await?;
    Ok(created(category))
}

#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    summary = "Update category",
    params(("id" = Uuid, Path, description = "Category id")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<category::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already used", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<UpdateCategoryRequest>,
) -> ApiResult<category::Model> {
    let category = state.services.categories.update(id, request).await?;
    Ok(Json(ApiResponse::success(category)))
}

/// Only empty categories can be deleted
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    summary = "Delete category",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Category still has products", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.categories.delete(id).await?;
    Ok(no_content_response())
}
