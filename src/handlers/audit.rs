use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{entities::audit_log, ApiResponse, ApiResult, AppState, PaginatedResponse};

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct AuditLogQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default)]
    pub limit: u64,
    /// Entity type, e.g. `order` or `setting`
    pub entity: Option<String>,
    pub user_id: Option<Uuid>,
}

fn default_page() -> u64 {
    1
}

#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    summary = "List audit log",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "Audit rows, newest first", body = ApiResponse<PaginatedResponse<audit_log::Model>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "audit"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<PaginatedResponse<audit_log::Model>> {
    let limit = state.page_limit(query.limit);
    let (rows, total) = state
        .services
        .audit
        .list(query.entity, query.user_id, query.page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        rows, total, query.page, limit,
    ))))
}
