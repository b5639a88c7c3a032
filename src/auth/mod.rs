/*!
 * # Authentication and Authorization Module
 *
 * Back-office users sign in with a username and password (argon2 hashes) and
 * receive an HS256 JWT. The token carries the user's role and the permissions
 * derived from it; `auth_middleware` validates it on every protected route and
 * `permission_middleware` gates route groups on a single permission.
 */

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use metrics::counter;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AppConfig,
    db::DbPool,
    entities::user::{self, Entity as UserEntity},
    errors::ServiceError,
    services::audit::{self, actions, RequestContext},
};

mod permissions;

pub use permissions::*;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,              // User ID
    pub name: String,             // Username
    pub roles: Vec<String>,       // Single role today, kept as a list in the token
    pub permissions: Vec<String>, // Derived from the role at issue time
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub token_id: String,
}

impl AuthUser {
    /// Check if the user has a specific role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Check if the user has a specific permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_admin() || self.permissions.iter().any(|p| p == permission)
    }

    /// Check if the user is an admin
    pub fn is_admin(&self) -> bool {
        self.has_role(&Role::Admin.to_string())
    }

    /// Audit context for this user and the request headers.
    pub fn context(&self, headers: &HeaderMap) -> RequestContext {
        let header_text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        RequestContext {
            user_id: Some(self.user_id),
            is_admin: self.is_admin(),
            ip_address: header_text("x-forwarded-for")
                .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
                .filter(|ip| !ip.is_empty()),
            user_agent: header_text(header::USER_AGENT.as_str()),
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: std::time::Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: std::time::Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
        }
    }

    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.auth_audience.clone(),
            cfg.auth_issuer.clone(),
            std::time::Duration::from_secs(cfg.jwt_expiration as u64),
        )
    }
}

/// Hashes a password with argon2 and a random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Checks a password against a stored PHC hash string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

/// Public view of a user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub role: String,
    pub permissions: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserProfile {
    fn from(model: user::Model) -> Self {
        let permissions = model
            .role
            .parse::<Role>()
            .map(permissions_for_role)
            .unwrap_or_default();
        Self {
            id: model.id,
            username: model.username,
            full_name: model.full_name,
            role: model.role,
            permissions,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

/// Login credentials
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Issued access token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub full_name: Option<String>,
    pub role: Role,
}

/// Authentication service that handles token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DbPool>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DbPool>) -> Self {
        Self { config, db }
    }

    /// Issues an access token for `user`.
    pub fn issue_token(&self, user: &user::Model) -> Result<TokenResponse, AuthError> {
        let role: Role = user
            .role
            .parse()
            .map_err(|_| AuthError::InternalError(format!("Unknown role '{}'", user.role)))?;
        let now = Utc::now();
        let expires = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            name: user.username.clone(),
            roles: vec![role.to_string()],
            permissions: permissions_for_role(role),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            user: UserProfile::from(user.clone()),
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => {
                debug!(error = %e, "Token rejected");
                AuthError::InvalidToken
            }
        })
    }

    /// Resolves a bearer token to an active user.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let user = self.find_user(user_id).await?;
        if !user.is_active {
            return Err(AuthError::InactiveUser);
        }
        Ok(AuthUser {
            user_id,
            username: claims.name,
            roles: claims.roles,
            permissions: claims.permissions,
            token_id: claims.jti,
        })
    }

    async fn find_user(&self, user_id: Uuid) -> Result<user::Model, AuthError> {
        UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, %user_id, "Failed to load user");
                AuthError::DatabaseError(e.to_string())
            })?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse, AuthError> {
        request
            .validate()
            .map_err(|_| AuthError::InvalidCredentials)?;
        let user = UserEntity::find()
            .filter(user::Column::Username.eq(request.username.trim()))
            .one(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load user for login");
                AuthError::DatabaseError(e.to_string())
            })?;

        let user = match user {
            Some(u) if verify_password(&request.password, &u.password_hash) => u,
            _ => {
                counter!("pos_auth.login", 1, "outcome" => "rejected");
                warn!(username = %request.username, "Login rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };
        if !user.is_active {
            counter!("pos_auth.login", 1, "outcome" => "inactive");
            return Err(AuthError::InactiveUser);
        }

        counter!("pos_auth.login", 1, "outcome" => "success");
        info!(user_id = %user.id, username = %user.username, "User signed in");
        self.issue_token(&user)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile, AuthError> {
        self.find_user(user_id).await.map(UserProfile::from)
    }

    /// Provisions a user; the username must be unused.
    pub async fn create_user(
        &self,
        request: CreateUserRequest,
        ctx: &RequestContext,
    ) -> Result<UserProfile, ServiceError> {
        request.validate()?;
        let username = request.username.trim().to_string();
        let taken = UserEntity::find()
            .filter(user::Column::Username.eq(username.as_str()))
            .count(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to check username");
                ServiceError::DatabaseError(e)
            })?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        let now = Utc::now();
        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username),
            full_name: Set(request.full_name),
            password_hash: Set(hash_password(&request.password)?),
            role: Set(request.role.to_string()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create user");
            ServiceError::DatabaseError(e)
        })?;

        audit::record(
            &*self.db,
            ctx,
            actions::USER_CREATE,
            "user",
            Some(created.id),
            Some(format!("{} ({})", created.username, created.role)),
        )
        .await?;
        info!(user_id = %created.id, role = %created.role, "User created");
        Ok(UserProfile::from(created))
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("User account is disabled")]
    InactiveUser,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) | AuthError::InternalError(msg) => {
                ServiceError::InternalError(msg)
            }
            AuthError::DatabaseError(msg) => ServiceError::database_error_message(msg),
            AuthError::PasswordHash(msg) => ServiceError::HashError(msg),
            AuthError::InvalidToken | AuthError::TokenExpired => ServiceError::JwtError(err.to_string()),
            // An unknown user behind a valid token is treated as a bad token
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        Ok(user.context(&parts.headers))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authentication middleware that validates the bearer token
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            error!("Authentication service missing from request extensions");
            return AuthError::InternalError("Authentication service not available".to_string())
                .into_response();
        }
    };

    let Some(token) = bearer_token(request.headers()).map(str::to_string) else {
        return AuthError::MissingAuth.into_response();
    };

    match auth_service.authenticate(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Permission middleware to check if a user has the required permission
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.has_permission(&required_permission) {
        debug!(user_id = %user.user_id, permission = %required_permission, "Permission denied");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service() -> AuthService {
        let db = sea_orm::DatabaseConnection::Disconnected;
        AuthService::new(
            AuthConfig::new(
                "test_secret_that_is_long_enough_for_hs256_signing_in_unit_tests_0123456789".into(),
                "pos-backoffice".into(),
                "pos-auth".into(),
                std::time::Duration::from_secs(3600),
            ),
            Arc::new(db),
        )
    }

    fn cashier() -> user::Model {
        let now = Utc::now();
        user::Model {
            id: Uuid::new_v4(),
            username: "cashier1".into(),
            full_name: None,
            password_hash: String::new(),
            role: Role::Cashier.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(verify_password("s3cret-pass", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret-pass", "not-a-phc-string"));
    }

    #[test]
    fn issued_token_carries_role_permissions() {
        let svc = service();
        let token = svc.issue_token(&cashier()).unwrap();
        let claims = svc.validate_token(&token.access_token).unwrap();
        assert_eq!(claims.roles, vec!["cashier".to_string()]);
        assert!(claims.permissions.contains(&consts::ORDERS_CREATE.to_string()));
        assert!(!claims.permissions.contains(&consts::END_DAY_RUN.to_string()));
    }

    #[test]
    fn token_for_another_audience_is_rejected() {
        let svc = service();
        let token = svc.issue_token(&cashier()).unwrap();
        let mut other = service();
        other.config.jwt_audience = "someone-else".into();
        assert_matches!(other.validate_token(&token.access_token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn admin_passes_every_permission_check() {
        let admin = AuthUser {
            user_id: Uuid::new_v4(),
            username: "admin".into(),
            roles: vec!["admin".into()],
            permissions: vec![],
            token_id: "t".into(),
        };
        assert!(admin.has_permission(consts::SETTINGS_WRITE));

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.7, 10.0.0.1".parse().unwrap());
        headers.insert(header::USER_AGENT, "till/1.0".parse().unwrap());
        let ctx = admin.context(&headers);
        assert!(ctx.is_admin);
        assert_eq!(ctx.ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(ctx.user_agent.as_deref(), Some("till/1.0"));
    }

    #[test]
    fn auth_errors_map_to_http_statuses() {
        use axum::http::StatusCode;
        assert_eq!(
            ServiceError::from(AuthError::InvalidToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::from(AuthError::InsufficientPermissions).status_code(),
            StatusCode::FORBIDDEN
        );

        let expired = ServiceError::from(AuthError::TokenExpired);
        assert_matches!(expired, ServiceError::JwtError(_));
        assert_eq!(expired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(expired.response_message(), "JWT error: Token has expired");

        let hashing = ServiceError::from(AuthError::PasswordHash("salt too short".into()));
        assert_matches!(hashing, ServiceError::HashError(_));
        assert_eq!(hashing.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(hashing.response_message(), "Internal server error");
    }
}
