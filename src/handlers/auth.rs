use axum::{extract::State, http::StatusCode, response::Json};

use crate::{
    auth::{AuthUser, CreateUserRequest, LoginRequest, TokenResponse, UserProfile},
    errors::ServiceError,
    handlers::common::{created, AppJson},
    services::audit::RequestContext,
    ApiResponse, ApiResult, AppState,
};

/// Exchange a username and password for an access token
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    summary = "Sign in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token issued", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Invalid credentials or disabled account", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> ApiResult<TokenResponse> {
    let token = state.auth.login(request).await?;
    Ok(Json(ApiResponse::success(token)))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    summary = "Current user",
    responses(
        (status = 200, description = "Signed-in user", body = ApiResponse<UserProfile>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<UserProfile> {
    let profile = state.auth.profile(user.user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    summary = "Create user",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserProfile>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username taken", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn create_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    AppJson(request): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserProfile>>), ServiceError> {
    let profile = state.auth.create_user(request, &ctx).await?;
    Ok(created(profile))
}
