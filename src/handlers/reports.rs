use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    services::reports::{CategorySales, DashboardStats, SalesReport, SalesReportQuery, TopProduct},
    ApiResponse, ApiResult, AppState,
};

const MAX_TOP_PRODUCTS: usize = 100;

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct TopProductsQuery {
    #[serde(default = "default_top")]
    pub limit: usize,
}

fn default_top() -> usize {
    10
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/dashboard",
    summary = "Dashboard figures",
    responses((status = 200, description = "Order counts and revenue by period", body = ApiResponse<DashboardStats>)),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    let stats = state.services.reports.dashboard().await?;
    Ok(Json(ApiResponse::success(stats)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/sales",
    summary = "Sales report",
    description = "Revenue bucketed by day, week or month over a preset or custom range",
    params(SalesReportQuery),
    responses(
        (status = 200, description = "Sales report", body = ApiResponse<SalesReport>),
        (status = 400, description = "Invalid range", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn sales_report(
    State(state): State<AppState>,
    Query(query): Query<SalesReportQuery>,
) -> ApiResult<SalesReport> {
    let report = state.services.reports.sales_report(query).await?;
    Ok(Json(ApiResponse::success(report)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/top-products",
    summary = "Best sellers",
    params(TopProductsQuery),
    responses((status = 200, description = "Products by units sold", body = ApiResponse<Vec<TopProduct>>)),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn top_products(
    State(state): State<AppState>,
    Query(query): Query<TopProductsQuery>,
) -> ApiResult<Vec<TopProduct>> {
    let limit = query.limit.clamp(1, MAX_TOP_PRODUCTS);
    let products = state.services.reports.top_products(limit).await?;
    Ok(Json(ApiResponse::success(products)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/categories",
    summary = "Sales per category",
    responses((status = 200, description = "Units and revenue per category", body = ApiResponse<Vec<CategorySales>>)),
    security(("Bearer" = [])),
    tag = "reports"
)]
pub async fn category_sales(State(state): State<AppState>) -> ApiResult<Vec<CategorySales>> {
    let sales = state.services.reports.category_sales().await?;
    Ok(Json(ApiResponse::success(sales)))
}
