use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;

use crate::{
    entities::{advance_adjustment, bill_adjustment, bill_adjustment_image},
    errors::ServiceError,
    handlers::common::{created, image_response, no_content_response, upload_content_type, AppJson},
    services::adjustments::{
        AdjustmentFilter, AdjustmentReport, CreateAdvanceRequest, CreateBillRequest,
        UpdateAdvanceRequest, UpdateBillRequest,
    },
    services::audit::RequestContext,
    services::receipts::AdjustmentReceipt,
    ApiResponse, ApiResult, AppState,
};

// Bills

#[utoipa::path(
    get,
    path = "/api/v1/adjustments/bills",
    summary = "List bill adjustments",
    description = "Non-admins only see records since the last End Day",
    params(AdjustmentFilter),
    responses((status = 200, description = "Bill adjustments", body = ApiResponse<Vec<bill_adjustment::Model>>)),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn list_bills(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(filter): Query<AdjustmentFilter>,
) -> ApiResult<Vec<bill_adjustment::Model>> {
    let bills = state.services.adjustments.list_bills(filter, &ctx).await?;
    Ok(Json(ApiResponse::success(bills)))
}

#[utoipa::path(
    get,
    path = "/api/v1/adjustments/bills/{id}",
    summary = "Get bill adjustment",
    params(("id" = Uuid, Path, description = "Bill adjustment id")),
    responses(
        (status = 200, description = "Bill adjustment", body = ApiResponse<bill_adjustment::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn get_bill(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<bill_adjustment::Model> {
    let bill = state.services.adjustments.get_bill(id, &ctx).await?;
    Ok(Json(ApiResponse::success(bill)))
}

#[utoipa::path(
    post,
    path = "/api/v1/adjustments/bills",
    summary = "Record a bill adjustment",
    request_body = CreateBillRequest,
    responses(
        (status = 201, description = "Bill adjustment recorded", body = ApiResponse<bill_adjustment::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn create_bill(
    State(state): State<AppState>,
    ctx: RequestContext,
    AppJson(request): AppJson<CreateBillRequest>,
) -> Result<(StatusCode, Json<ApiResponse<bill_adjustment::Model>>), ServiceError> {
    let bill = state.services.adjustments.create_bill(request, &ctx).await?;
    Ok(created(bill))
}

#[utoipa::path(
    put,
    path = "/api/v1/adjustments/bills/{id}",
    summary = "Update bill adjustment",
    params(("id" = Uuid, Path, description = "Bill adjustment id")),
    request_body = UpdateBillRequest,
    responses(
        (status = 200, description = "Bill adjustment updated", body = ApiResponse<bill_adjustment::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn update_bill(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<UpdateBillRequest>,
) -> ApiResult<bill_adjustment::Model> {
    let bill = state
        .services
        .adjustments
        .update_bill(id, request, &ctx)
        .await?;
    Ok(Json(ApiResponse::success(bill)))
}

/// Admin only
#[utoipa::path(
    delete,
    path = "/api/v1/adjustments/bills/{id}",
    summary = "Delete bill adjustment",
    params(("id" = Uuid, Path, description = "Bill adjustment id")),
    responses(
        (status = 204, description = "Bill adjustment deleted"),
        (status = 403, description = "Admins only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn delete_bill(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.adjustments.delete_bill(id, &ctx).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/adjustments/bills/{id}/images",
    summary = "List bill images",
    params(("id" = Uuid, Path, description = "Bill adjustment id")),
    responses((status = 200, description = "Image metadata", body = ApiResponse<Vec<bill_adjustment_image::Model>>)),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn list_bill_images(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<bill_adjustment_image::Model>> {
    let images = state.services.adjustments.list_bill_images(id, &ctx).await?;
    Ok(Json(ApiResponse::success(images)))
}

/// Raw image body; the Content-Type header names the format
#[utoipa::path(
    post,
    path = "/api/v1/adjustments/bills/{id}/images",
    summary = "Attach a bill image",
    params(("id" = Uuid, Path, description = "Bill adjustment id")),
    request_body(content = Vec<u8>, content_type = "image/jpeg"),
    responses(
        (status = 201, description = "Image stored", body = ApiResponse<bill_adjustment_image::Model>),
        (status = 400, description = "Unsupported or empty image", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn upload_bill_image(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<bill_adjustment_image::Model>>), ServiceError> {
    let content_type = upload_content_type(&headers)?;
    let image = state
        .services
        .adjustments
        .add_bill_image(id, &content_type, body.to_vec(), &ctx)
        .await?;
    Ok(created(image))
}

#[utoipa::path(
    get,
    path = "/api/v1/adjustments/bills/{id}/images/{image_id}",
    summary = "Get bill image",
    params(
        ("id" = Uuid, Path, description = "Bill adjustment id"),
        ("image_id" = Uuid, Path, description = "Image id"),
    ),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 304, description = "Not modified"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn get_bill_image(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let image = state
        .services
        .adjustments
        .get_bill_image(id, image_id, &ctx)
        .await?;
    image_response(image, &headers)
}

#[utoipa::path(
    delete,
    path = "/api/v1/adjustments/bills/{id}/images/{image_id}",
    summary = "Delete bill image",
    params(
        ("id" = Uuid, Path, description = "Bill adjustment id"),
        ("image_id" = Uuid, Path, description = "Image id"),
    ),
    responses(
        (status = 204, description = "Image deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn delete_bill_image(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ServiceError> {
    state
        .services
        .adjustments
        .delete_bill_image(id, image_id, &ctx)
        .await?;
    Ok(no_content_response())
}

// Advances

#[utoipa::path(
    get,
    path = "/api/v1/adjustments/advances",
    summary = "List advance adjustments",
    description = "Non-admins only see records since the last End Day",
    params(AdjustmentFilter),
    responses((status = 200, description = "Advance adjustments", body = ApiResponse<Vec<advance_adjustment::Model>>)),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn list_advances(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(filter): Query<AdjustmentFilter>,
) -> ApiResult<Vec<advance_adjustment::Model>> {
    let advances = state.services.adjustments.list_advances(filter, &ctx).await?;
    Ok(Json(ApiResponse::success(advances)))
}

#[utoipa::path(
    get,
    path = "/api/v1/adjustments/advances/{id}",
    summary = "Get advance adjustment",
    params(("id" = Uuid, Path, description = "Advance adjustment id")),
    responses(
        (status = 200, description = "Advance adjustment", body = ApiResponse<advance_adjustment::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn get_advance(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> ApiResult<advance_adjustment::Model> {
    let advance = state.services.adjustments.get_advance(id, &ctx).await?;
    Ok(Json(ApiResponse::success(advance)))
}

#[utoipa::path(
    post,
    path = "/api/v1/adjustments/advances",
    summary = "Record an advance",
    request_body = CreateAdvanceRequest,
    responses(
        (status = 201, description = "Advance recorded", body = ApiResponse<advance_adjustment::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn create_advance(
    State(state): State<AppState>,
    ctx: RequestContext,
    AppJson(request): AppJson<CreateAdvanceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<advance_adjustment::Model>>), ServiceError> {
    let advance = state
        .services
        .adjustments
        .create_advance(request, &ctx)
        .await?;
    Ok(created(advance))
}

#[utoipa::path(
    put,
    path = "/api/v1/adjustments/advances/{id}",
    summary = "Update advance adjustment",
    params(("id" = Uuid, Path, description = "Advance adjustment id")),
    request_body = UpdateAdvanceRequest,
    responses(
        (status = 200, description = "Advance updated", body = ApiResponse<advance_adjustment::Model>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn update_advance(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<UpdateAdvanceRequest>,
) -> ApiResult<advance_adjustment::Model> {
    let advance = state
        .services
        .adjustments
        .update_advance(id, request, &ctx)
        .await?;
    Ok(Json(ApiResponse::success(advance)))
}

/// Advances are never deleted
#[utoipa::path(
    delete,
    path = "/api/v1/adjustments/advances/{id}",
    summary = "Delete advance adjustment",
    params(("id" = Uuid, Path, description = "Advance adjustment id")),
    responses((status = 400, description = "Advances cannot be deleted", body = crate::errors::ErrorResponse)),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn delete_advance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.adjustments.delete_advance(id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/adjustments/report",
    summary = "Adjustment totals",
    description = "Defaults to the current month",
    params(AdjustmentFilter),
    responses((status = 200, description = "Totals", body = ApiResponse<AdjustmentReport>)),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn adjustment_report(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(filter): Query<AdjustmentFilter>,
) -> ApiResult<AdjustmentReport> {
    let report = state.services.adjustments.report(filter, &ctx).await?;
    Ok(Json(ApiResponse::success(report)))
}

#[utoipa::path(
    get,
    path = "/api/v1/adjustments/receipt",
    summary = "Adjustment receipt",
    description = "Bills and advances with totals; defaults to the current month",
    params(AdjustmentFilter),
    responses((status = 200, description = "Receipt", body = ApiResponse<AdjustmentReceipt>)),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn adjustment_receipt(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(filter): Query<AdjustmentFilter>,
) -> ApiResult<AdjustmentReceipt> {
    let receipt = state.services.receipts.adjustment_receipt(filter, &ctx).await?;
    Ok(Json(ApiResponse::success(receipt)))
}

/// Fixed-width text for thermal printers
#[utoipa::path(
    get,
    path = "/api/v1/adjustments/receipt.txt",
    summary = "Printable adjustment receipt",
    params(AdjustmentFilter),
    responses((status = 200, description = "Receipt text", body = String, content_type = "text/plain")),
    security(("Bearer" = [])),
    tag = "adjustments"
)]
pub async fn adjustment_receipt_text(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(filter): Query<AdjustmentFilter>,
) -> Result<Response, ServiceError> {
    let receipt = state.services.receipts.adjustment_receipt(filter, &ctx).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        receipt.render_text(),
    )
        .into_response())
}
