//! POS back office library
//!
//! Catalog, order entry with the total engine, discounts, receipts, End Day
//! reconciliation and reports behind a JSON API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::auth::consts as perm;
use crate::auth::AuthRouterExt;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Option<Arc<events::EventSender>>,
    pub services: handlers::AppServices,
    pub auth: Arc<auth::AuthService>,
}

impl AppState {
    /// Wires every service over one pool and event channel.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: Option<Arc<events::EventSender>>,
    ) -> Self {
        let auth = Arc::new(auth::AuthService::new(
            auth::AuthConfig::from_app_config(&config),
            db.clone(),
        ));
        let services = handlers::AppServices::new(
            db.clone(),
            event_sender.clone(),
            Arc::new(config.clone()),
            auth.clone(),
        );
        Self {
            db,
            config,
            event_sender,
            services,
            auth,
        }
    }

    /// Page size clamped to the configured maximum.
    pub fn page_limit(&self, requested: u64) -> u64 {
        let max = u64::from(self.config.api_max_page_size.max(1));
        if requested == 0 {
            u64::from(self.config.api_default_page_size).clamp(1, max)
        } else {
            requested.min(max)
        }
    }
}

// Common query parameters for list endpoints
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub search: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            search: None,
        }
    }
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(data)
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }

    #[test]
    fn pagination_rounds_pages_up() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 41, 1, 20);
        assert_eq!(page.total_pages, 3);
        let empty = PaginatedResponse::<u8>::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    // Catalog
    let catalog_read = Router::new()
        .route("/categories", get(handlers::categories::list_categories))
        .route("/categories/active", get(handlers::categories::list_active_categories))
        .route("/categories/:id", get(handlers::categories::get_category))
        .route("/categories/:id/products", get(handlers::products::list_category_products))
        .route("/products", get(handlers::products::list_products))
        .route("/products/search", get(handlers::products::search_products))
        .route("/products/available", get(handlers::products::list_available_products))
        .route("/products/low-stock", get(handlers::products::list_low_stock_products))
        .route("/products/:id", get(handlers::products::get_product))
        .route("/products/:id/image", get(handlers::products::get_product_image))
        .with_permission(perm::CATALOG_READ);

    let catalog_write = Router::new()
        .route("/categories", post(handlers::categories::create_category))
        .route(
            "/categories/:id",
            put(handlers::categories::update_category).delete(handlers::categories::delete_category),
        )
        .route("/products", post(handlers::products::create_product))
        .route(
            "/products/:id",
            put(handlers::products::update_product).delete(handlers::products::delete_product),
        )
        .route("/products/:id/stock", put(handlers::products::update_product_stock))
        .route(
            "/products/:id/image",
            put(handlers::products::upload_product_image)
                .delete(handlers::products::delete_product_image),
        )
        .with_permission(perm::CATALOG_WRITE);

    // Orders
    let orders_read = Router::new()
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/today", get(handlers::orders::list_today_orders))
        .route("/orders/status/:status", get(handlers::orders::list_orders_by_status))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/receipt", get(handlers::orders::get_receipt))
        .route("/orders/:id/receipt.txt", get(handlers::orders::get_receipt_text))
        .with_permission(perm::ORDERS_READ);

    let orders_create = Router::new()
        .route("/orders", post(handlers::orders::create_order))
        .route("/pos/orders", post(handlers::pos::create_order))
        .with_permission(perm::ORDERS_CREATE);

    let orders_update = Router::new()
        .route("/orders/:id", put(handlers::orders::update_order))
        .route("/orders/:id/items", post(handlers::orders::add_order_item))
        .route(
            "/orders/:id/items/:item_id",
            put(handlers::orders::update_order_item).delete(handlers::orders::remove_order_item),
        )
        .route("/orders/:id/complete", post(handlers::orders::complete_order))
        .with_permission(perm::ORDERS_UPDATE);

    let orders_pay = Router::new()
        .route("/orders/:id/pay", post(handlers::orders::pay_order))
        .with_permission(perm::ORDERS_PAY);

    let orders_cancel = Router::new()
        .route("/orders/:id/cancel", post(handlers::orders::cancel_order))
        .with_permission(perm::ORDERS_CANCEL);

    let orders_delete = Router::new()
        .route("/orders/:id", delete(handlers::orders::delete_order))
        .with_permission(perm::ORDERS_DELETE);

    let stock_check = Router::new()
        .route("/pos/stock/check", post(handlers::pos::check_stock))
        .with_permission(perm::CATALOG_READ);

    // Discounts
    let discounts_read = Router::new()
        .route("/discounts", get(handlers::discounts::list_discounts))
        .route("/discounts/active", get(handlers::discounts::list_active_discounts))
        .route("/discounts/:id", get(handlers::discounts::get_discount))
        .route("/discounts/validate", post(handlers::discounts::validate_discount))
        .route("/pos/discounts/validate", post(handlers::pos::validate_discount))
        .with_permission(perm::DISCOUNTS_READ);

    let discounts_write = Router::new()
        .route("/discounts", post(handlers::discounts::create_discount))
        .route(
            "/discounts/:id",
            put(handlers::discounts::update_discount).delete(handlers::discounts::delete_discount),
        )
        .with_permission(perm::DISCOUNTS_WRITE);

    // Settings
    let settings_read = Router::new()
        .route("/settings", get(handlers::settings::list_settings))
        .route("/settings/business", get(handlers::settings::get_business_info))
        .route("/settings/logo", get(handlers::settings::get_logo))
        .route("/settings/:key", get(handlers::settings::get_setting))
        .with_permission(perm::SETTINGS_READ);

    let settings_write = Router::new()
        .route("/settings", put(handlers::settings::bulk_update_settings))
        .route(
            "/settings/logo",
            put(handlers::settings::upload_logo).delete(handlers::settings::delete_logo),
        )
        .route(
            "/settings/:key",
            put(handlers::settings::upsert_setting).delete(handlers::settings::delete_setting),
        )
        .with_permission(perm::SETTINGS_WRITE);

    // Adjustments
    let adjustments_read = Router::new()
        .route("/adjustments/bills", get(handlers::adjustments::list_bills))
        .route("/adjustments/bills/:id", get(handlers::adjustments::get_bill))
        .route("/adjustments/bills/:id/images", get(handlers::adjustments::list_bill_images))
        .route(
            "/adjustments/bills/:id/images/:image_id",
            get(handlers::adjustments::get_bill_image),
        )
        .route("/adjustments/advances", get(handlers::adjustments::list_advances))
        .route("/adjustments/advances/:id", get(handlers::adjustments::get_advance))
        .route("/adjustments/report", get(handlers::adjustments::adjustment_report))
        .route("/adjustments/receipt", get(handlers::adjustments::adjustment_receipt))
        .route("/adjustments/receipt.txt", get(handlers::adjustments::adjustment_receipt_text))
        .with_permission(perm::ADJUSTMENTS_READ);

    let adjustments_write = Router::new()
        .route("/adjustments/bills", post(handlers::adjustments::create_bill))
        .route(
            "/adjustments/bills/:id",
            put(handlers::adjustments::update_bill).delete(handlers::adjustments::delete_bill),
        )
        .route("/adjustments/bills/:id/images", post(handlers::adjustments::upload_bill_image))
        .route(
            "/adjustments/bills/:id/images/:image_id",
            delete(handlers::adjustments::delete_bill_image),
        )
        .route("/adjustments/advances", post(handlers::adjustments::create_advance))
        .route(
            "/adjustments/advances/:id",
            put(handlers::adjustments::update_advance)
                .delete(handlers::adjustments::delete_advance),
        )
        .with_permission(perm::ADJUSTMENTS_WRITE);

    // End day
    let end_day_read = Router::new()
        .route("/end-day", get(handlers::end_day::list_end_days))
        .route("/end-day/current", get(handlers::end_day::current_period))
        .route("/end-day/last", get(handlers::end_day::last_end_day))
        .route("/end-day/:id", get(handlers::end_day::get_end_day))
        .with_permission(perm::END_DAY_READ);

    let end_day_run = Router::new()
        .route("/end-day", post(handlers::end_day::run_end_day))
        .with_permission(perm::END_DAY_RUN);

    // Reports and audit
    let reports = Router::new()
        .route("/reports/dashboard", get(handlers::reports::dashboard))
        .route("/reports/sales", get(handlers::reports::sales_report))
        .route("/reports/top-products", get(handlers::reports::top_products))
        .route("/reports/categories", get(handlers::reports::category_sales))
        .with_permission(perm::REPORTS_READ);

    let audit_logs = Router::new()
        .route("/audit-logs", get(handlers::audit::list_audit_logs))
        .with_permission(perm::AUDIT_READ);

    // Auth
    let auth_public = Router::new().route("/auth/login", post(handlers::auth::login));
    let auth_me = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .with_auth();
    let users = Router::new()
        .route("/users", post(handlers::auth::create_user))
        .with_permission(perm::USERS_MANAGE);

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(auth_public)
        .merge(auth_me)
        .merge(users)
        .merge(catalog_read)
        .merge(catalog_write)
        .merge(orders_read)
        .merge(orders_create)
        .merge(orders_update)
        .merge(orders_pay)
        .merge(orders_cancel)
        .merge(orders_delete)
        .merge(stock_check)
        .merge(discounts_read)
        .merge(discounts_write)
        .merge(settings_read)
        .merge(settings_write)
        .merge(adjustments_read)
        .merge(adjustments_write)
        .merge(end_day_read)
        .merge(end_day_run)
        .merge(reports)
        .merge(audit_logs)
}

/// `/api/v1` with the auth service injected and request ids assigned.
///
/// Transport layers (CORS, compression, timeouts) are added by the binary.
pub fn app_router(state: AppState) -> Router {
    let auth_service = state.auth.clone();
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            |State(auth): State<Arc<auth::AuthService>>,
             mut req: axum::extract::Request,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "pos-backoffice",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
            "events": if state.event_sender.is_some() { "enabled" } else { "disabled" },
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
