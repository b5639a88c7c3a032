use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    entities::product,
    errors::ServiceError,
    handlers::common::{created, image_response, no_content_response, upload_content_type, AppJson},
    services::audit::RequestContext,
    services::products::{
        CreateProductRequest, DeleteOutcome, ProductFilter, UpdateProductRequest,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ProductListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default)]
    pub limit: u64,
    /// Matches name, barcode or SKU
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub available_only: bool,
    #[serde(default)]
    pub include_archived: bool,
}

fn default_page() -> u64 {
    1
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ProductSearchQuery {
    pub q: String,
    #[serde(default = "default_search_limit")]
    pub limit: u64,
}

fn default_search_limit() -> u64 {
    20
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct LowStockQuery {
    /// Defaults to the `low_stock_threshold` setting
    pub threshold: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateStockRequest {
    pub stock_quantity: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeleteProductResponse {
    pub id: Uuid,
    pub outcome: DeleteOutcome,
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    summary = "List products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Products", body = ApiResponse<PaginatedResponse<product::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> ApiResult<PaginatedResponse<product::Model>> {
    let limit = state.page_limit(query.limit);
    let filter = ProductFilter {
        search: query.search,
        category_id: query.category_id,
        available_only: query.available_only,
        include_archived: query.include_archived,
    };
    let (items, total) = state
        .services
        .products
        .list(filter, query.page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, query.page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/search",
    summary = "Search products",
    params(ProductSearchQuery),
    responses((status = 200, description = "Matching products", body = ApiResponse<Vec<product::Model>>)),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn search_products(
    State(state): State<AppState>,
    Query(query): Query<ProductSearchQuery>,
) -> ApiResult<Vec<product::Model>> {
    let limit = state.page_limit(query.limit);
    let products = state.services.products.search(&query.q, limit).await?;
    Ok(Json(ApiResponse::success(products)))
}

/// Products the till can sell right now
#[utoipa::path(
    get,
    path = "/api/v1/products/available",
    summary = "List available products",
    responses((status = 200, description = "Available products", body = ApiResponse<Vec<product::Model>>)),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn list_available_products(State(state): State<AppState>) -> ApiResult<Vec<product::Model>> {
    let products = state.services.products.available().await?;
    Ok(Json(ApiResponse::success(products)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/low-stock",
    summary = "List low stock products",
    params(LowStockQuery),
    responses((status = 200, description = "Tracked products under the threshold", body = ApiResponse<Vec<product::Model>>)),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn list_low_stock_products(
    State(state): State<AppState>,
    Query(query): Query<LowStockQuery>,
) -> ApiResult<Vec<product::Model>> {
    let threshold = match query.threshold {
        Some(t) => t,
        None => state.services.settings.low_stock_threshold().await?,
    };
    let products = state.services.products.low_stock(threshold).await?;
    Ok(Json(ApiResponse::success(products)))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}/products",
    summary = "List products in a category",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 200, description = "Products", body = ApiResponse<Vec<product::Model>>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn list_category_products(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<product::Model>> {
    state.services.categories.get(id).await?;
    let products = state.services.products.by_category(id).await?;
    Ok(Json(ApiResponse::success(products)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    summary = "Get product",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<product::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<product::Model> {
    let product = state.services.products.get(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    summary = "Create product",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<product::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<product::Model>>), ServiceError> {
    let product = state.services.products.create(request).await?;
    Ok(created(product))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    summary = "Update product",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<product::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<UpdateProductRequest>,
) -> ApiResult<product::Model> {
    let product = state.services.products.update(id, request).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// Sets an absolute stock level
#[utoipa::path(
    put,
    path = "/api/v1/products/{id}/stock",
    summary = "Set product stock",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateStockRequest,
    responses(
        (status = 200, description = "Stock updated", body = ApiResponse<product::Model>),
        (status = 400, description = "Negative stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn update_product_stock(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<UpdateStockRequest>,
) -> ApiResult<product::Model> {
    let threshold = state.services.settings.low_stock_threshold().await?;
    let product = state
        .services
        .products
        .update_stock(id, request.stock_quantity, threshold, &ctx)
        .await?;
    Ok(Json(ApiResponse::success(product)))
}

/// Deletes the product, or archives it when orders reference it
#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    summary = "Delete product",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted or archived", body = ApiResponse<DeleteProductResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<DeleteProductResponse> {
    let outcome = state.services.products.delete(id, &ctx).await?;
    let message = match outcome {
        DeleteOutcome::Deleted => "Product deleted",
        DeleteOutcome::Archived => "Product is referenced by orders and was archived",
    };
    Ok(Json(ApiResponse::success_with_message(
        DeleteProductResponse { id, outcome },
        message,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/image",
    summary = "Get product image",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 304, description = "Not modified"),
        (status = 404, description = "No image", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn get_product_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let image = state.services.products.get_image(id).await?;
    image_response(image, &headers)
}

/// Raw image body; the Content-Type header names the format
#[utoipa::path(
    put,
    path = "/api/v1/products/{id}/image",
    summary = "Upload product image",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body(content = Vec<u8>, content_type = "image/png"),
    responses(
        (status = 200, description = "Image stored", body = ApiResponse<product::Model>),
        (status = 400, description = "Unsupported or empty image", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn upload_product_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<product::Model> {
    let content_type = upload_content_type(&headers)?;
    let product = state
        .services
        .products
        .set_image(id, &content_type, body.to_vec())
        .await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}/image",
    summary = "Remove product image",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 204, description = "Image removed"),
        (status = 404, description = "No image", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn delete_product_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.products.delete_image(id).await?;
    Ok(no_content_response())
}
