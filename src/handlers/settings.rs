use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{Json, Response},
};
use serde::Deserialize;
use std::collections::BTreeMap;
use utoipa::IntoParams;

use crate::{
    entities::setting,
    errors::ServiceError,
    handlers::common::{image_response, no_content_response, upload_content_type, AppJson},
    services::audit::RequestContext,
    services::settings::{BusinessInfo, LogoInfo, UpsertSettingRequest},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct SettingsQuery {
    /// business, receipt, tax, charges, system or custom
    pub group: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/settings",
    summary = "List settings",
    params(SettingsQuery),
    responses((status = 200, description = "Settings", body = ApiResponse<Vec<setting::Model>>)),
    security(("Bearer" = [])),
    tag = "settings"
)]
pub async fn list_settings(
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
) -> ApiResult<Vec<setting::Model>> {
    let settings = state.services.settings.list(query.group).await?;
    Ok(Json(ApiResponse::success(settings)))
}

/// Business details as printed on receipts
#[utoipa::path(
    get,
    path = "/api/v1/settings/business",
    summary = "Business info",
    responses((status = 200, description = "Business info", body = ApiResponse<BusinessInfo>)),
    security(("Bearer" = [])),
    tag = "settings"
)]
pub async fn get_business_info(State(state): State<AppState>) -> ApiResult<BusinessInfo> {
    let info = state.services.settings.business_info().await?;
    Ok(Json(ApiResponse::success(info)))
}

#[utoipa::path(
    get,
    path = "/api/v1/settings/logo",
    summary = "Get business logo",
    responses(
        (status = 200, description = "Logo bytes"),
        (status = 304, description = "Not modified"),
        (status = 404, description = "No logo", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "settings"
)]
pub async fn get_logo(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ServiceError> {
    let logo = state.services.settings.get_logo().await?;
    image_response(logo, &headers)
}

/// Raw image body; replaces any previous logo
#[utoipa::path(
    put,
    path = "/api/v1/settings/logo",
    summary = "Upload business logo",
    request_body(content = Vec<u8>, content_type = "image/png"),
    responses(
        (status = 200, description = "Logo stored", body = ApiResponse<LogoInfo>),
        (status = 400, description = "Unsupported or empty image", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "settings"
)]
pub async fn upload_logo(
    State(state): State<AppState>,
    ctx: RequestContext,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<LogoInfo> {
    let content_type = upload_content_type(&headers)?;
    let info = state
        .services
        .settings
        .set_logo(&content_type, body.to_vec(), &ctx)
        .await?;
    Ok(Json(ApiResponse::success(info)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/settings/logo",
    summary = "Remove business logo",
    responses(
        (status = 204, description = "Logo removed"),
        (status = 404, description = "No logo", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "settings"
)]
pub async fn delete_logo(State(state): State<AppState>, ctx: RequestContext) -> Result<Response, ServiceError> {
    state.services.settings.delete_logo(&ctx).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/settings/{key}",
    summary = "Get setting",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 200, description = "Setting", body = ApiResponse<setting::Model>),
        (status = 404, description = "Unknown key", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "settings"
)]
pub async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<setting::Model> {
    let setting = state.services.settings.get(&key).await?;
    Ok(Json(ApiResponse::success(setting)))
}

#[utoipa::path(
    put,
    path = "/api/v1/settings/{key}",
    summary = "Create or update a setting",
    params(("key" = String, Path, description = "Setting key")),
    request_body = UpsertSettingRequest,
    responses(
        (status = 200, description = "Setting saved", body = ApiResponse<setting::Model>),
        (status = 400, description = "Invalid key or value", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "settings"
)]
pub async fn upsert_setting(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(key): Path<String>,
    AppJson(request): AppJson<UpsertSettingRequest>,
) -> ApiResult<setting::Model> {
    let setting = state.services.settings.upsert(&key, request, &ctx).await?;
    Ok(Json(ApiResponse::success(setting)))
}

/// Saves many keys at once; nothing is written when any value is rejected
#[utoipa::path(
    put,
    path = "/api/v1/settings",
    summary = "Bulk update settings",
    request_body = BTreeMap<String, String>,
    responses(
        (status = 200, description = "Settings saved", body = ApiResponse<Vec<setting::Model>>),
        (status = 400, description = "Invalid key or value", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "settings"
)]
pub async fn bulk_update_settings(
    State(state): State<AppState>,
    ctx: RequestContext,
    AppJson(values): AppJson<BTreeMap<String, String>>,
) -> ApiResult<Vec<setting::Model>> {
    let saved = state.services.settings.bulk_update(values, &ctx).await?;
    Ok(Json(ApiResponse::success(saved)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/settings/{key}",
    summary = "Delete a custom setting",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 204, description = "Setting deleted"),
        (status = 400, description = "Built-in keys cannot be deleted", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown key", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "settings"
)]
pub async fn delete_setting(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(key): Path<String>,
) -> Result<Response, ServiceError> {
    state.services.settings.delete(&key, &ctx).await?;
    Ok(no_content_response())
}
