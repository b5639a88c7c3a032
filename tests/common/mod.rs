#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use pos_backoffice::{
    auth::{CreateUserRequest, Role},
    config::AppConfig,
    db,
    entities::{category, product, user},
    events::{self, EventSender},
    services::{
        audit::RequestContext, categories::CreateCategoryRequest, products::CreateProductRequest,
    },
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::EntityTrait;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

const TEST_SECRET: &str =
    "integration-test-signing-key-0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJ";

/// Application over a throwaway SQLite file, with an admin and a cashier signed in.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    admin_token: String,
    cashier_token: String,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir");
        let db_path = db_dir.path().join("pos.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));
        let state = AppState::new(
            Arc::new(pool),
            cfg,
            Some(Arc::new(EventSender::new(event_tx))),
        );
        state
            .services
            .settings
            .ensure_defaults()
            .await
            .expect("seed default settings");

        let admin_token = Self::provision(&state, "admin", Role::Admin).await;
        let cashier_token = Self::provision(&state, "cashier", Role::Cashier).await;

        Self {
            router: pos_backoffice::app_router(state.clone()),
            state,
            admin_token,
            cashier_token,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    async fn provision(state: &AppState, username: &str, role: Role) -> String {
        let profile = state
            .auth
            .create_user(
                CreateUserRequest {
                    username: username.to_string(),
                    password: "correct-horse-battery".to_string(),
                    full_name: None,
                    role,
                },
                &RequestContext::system(),
            )
            .await
            .expect("create test user");
        let model = user::Entity::find_by_id(profile.id)
            .one(&*state.db)
            .await
            .expect("load test user")
            .expect("test user exists");
        state
            .auth
            .issue_token(&model)
            .expect("issue test token")
            .access_token
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    pub fn cashier_token(&self) -> &str {
        &self.cashier_token
    }

    /// Sends a request with an optional JSON body and bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error during test request")
    }

    /// Sends a prebuilt request as the admin.
    pub async fn send_as_admin(&self, builder: axum::http::request::Builder, body: Body) -> Response {
        let request = builder
            .header("authorization", format!("Bearer {}", self.admin_token()))
            .body(body)
            .expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Admin request that must answer `expected`; returns the JSON body.
    pub async fn admin(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let response = self.request(method.clone(), uri, body, Some(self.admin_token())).await;
        let status = response.status();
        let json = response_json(response).await;
        assert_eq!(status, expected, "{} {} answered {}", method, uri, json);
        json
    }

    pub async fn seed_category(&self, name: &str) -> category::Model {
        self.state
            .services
            .categories
            .create(CreateCategoryRequest {
                name: name.to_string(),
                description: None,
                is_active: Some(true),
            })
            .await
            .expect("seed category")
    }

    pub async fn seed_product(
        &self,
        category_id: uuid::Uuid,
        name: &str,
        price: Decimal,
        stock: i32,
        running_item: bool,
    ) -> product::Model {
        self.state
            .services
            .products
            .create(CreateProductRequest {
                category_id,
                name: name.to_string(),
                description: None,
                price,
                cost_price: None,
                barcode: None,
                sku: None,
                stock_quantity: Some(stock),
                running_item: Some(running_item),
                is_available: Some(true),
            })
            .await
            .expect("seed product")
    }

    pub async fn stock_of(&self, product_id: uuid::Uuid) -> i32 {
        self.state
            .services
            .products
            .get(product_id)
            .await
            .expect("load product")
            .stock_quantity
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Reads a money field, which serializes as a decimal string.
pub fn money(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected a money value, got {}", other),
    }
}
