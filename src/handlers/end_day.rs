use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    handlers::common::{created, AppJson},
    handlers::orders::PageQuery,
    services::audit::RequestContext,
    services::end_day::{EndDayRecord, PeriodTotals, RunEndDayRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[utoipa::path(
    get,
    path = "/api/v1/end-day",
    summary = "List End Day markers",
    params(PageQuery),
    responses((status = 200, description = "Markers with their summaries", body = ApiResponse<PaginatedResponse<EndDayRecord>>)),
    security(("Bearer" = [])),
    tag = "end-day"
)]
pub async fn list_end_days(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> ApiResult<PaginatedResponse<EndDayRecord>> {
    let limit = state.page_limit(page.limit);
    let (records, total) = state.services.end_day.list(page.page, limit).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        records, total, page.page, limit,
    ))))
}

/// Totals of the open period, without closing it
#[utoipa::path(
    get,
    path = "/api/v1/end-day/current",
    summary = "Open period totals",
    responses((status = 200, description = "Running totals", body = ApiResponse<PeriodTotals>)),
    security(("Bearer" = [])),
    tag = "end-day"
)]
pub async fn current_period(State(state): State<AppState>) -> ApiResult<PeriodTotals> {
    let totals = state.services.end_day.current().await?;
    Ok(Json(ApiResponse::success(totals)))
}

#[utoipa::path(
    get,
    path = "/api/v1/end-day/last",
    summary = "Last End Day",
    responses(
        (status = 200, description = "Most recent marker", body = ApiResponse<EndDayRecord>),
        (status = 404, description = "End Day has never been run", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "end-day"
)]
pub async fn last_end_day(State(state): State<AppState>) -> ApiResult<EndDayRecord> {
    let record = state
        .services
        .end_day
        .last()
        .await?
        .ok_or_else(|| ServiceError::NotFound("End Day has never been run".to_string()))?;
    Ok(Json(ApiResponse::success(record)))
}

#[utoipa::path(
    get,
    path = "/api/v1/end-day/{id}",
    summary = "Get End Day",
    params(("id" = Uuid, Path, description = "End Day id")),
    responses(
        (status = 200, description = "Marker with its summary", body = ApiResponse<EndDayRecord>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "end-day"
)]
pub async fn get_end_day(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<EndDayRecord> {
    let record = state.services.end_day.get(id).await?;
    Ok(Json(ApiResponse::success(record)))
}

/// Closes the open period and stores its sales summary
#[utoipa::path(
    post,
    path = "/api/v1/end-day",
    summary = "Run End Day",
    request_body = RunEndDayRequest,
    responses(
        (status = 201, description = "Period closed", body = ApiResponse<EndDayRecord>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "end-day"
)]
pub async fn run_end_day(
    State(state): State<AppState>,
    ctx: RequestContext,
    request: Option<AppJson<RunEndDayRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<EndDayRecord>>), ServiceError> {
    let request = request.map(|AppJson(r)| r).unwrap_or_default();
    let record = state.services.end_day.run(request, &ctx).await?;
    Ok(created(record))
}
