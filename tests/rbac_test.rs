//! Authentication and role checks across the router.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use test_case::test_case;

#[test_case(Method::POST, "/api/v1/end-day", None ; "closing the day")]
#[test_case(Method::PUT, "/api/v1/settings/tax_rate_cash", Some(json!({ "value": "10" })) ; "changing a rate")]
#[test_case(Method::POST, "/api/v1/categories", Some(json!({ "name": "Drinks" })) ; "editing the catalog")]
#[test_case(Method::GET, "/api/v1/audit-logs", None ; "reading the audit trail")]
#[test_case(Method::GET, "/api/v1/reports/dashboard", None ; "reading reports")]
#[test_case(Method::POST, "/api/v1/users", Some(json!({ "username": "eve", "password": "long-enough-pw", "role": "admin" })) ; "creating users")]
#[tokio::test]
async fn cashier_is_forbidden(method: Method, uri: &str, body: Option<serde_json::Value>) {
    let app = TestApp::new().await;
    let response = app.request(method, uri, body, Some(app.cashier_token())).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = response_json(response).await;
    assert!(json["message"].is_string(), "error body: {}", json);
}

#[tokio::test]
async fn cashier_rings_up_orders() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let nihari = app.seed_product(mains.id, "Nihari", dec!(650), 10, false).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/pos/orders",
            Some(json!({
                "order_type": "Dine In",
                "payment_method": "Cash",
                "items": [{ "product_id": nihari.id, "quantity": 1 }]
            })),
            Some(app.cashier_token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let settings = app
        .request(Method::GET, "/api/v1/settings", None, Some(app.cashier_token()))
        .await;
    assert_eq!(settings.status(), StatusCode::OK);

    let period = app
        .request(Method::GET, "/api/v1/end-day/current", None, Some(app.cashier_token()))
        .await;
    assert_eq!(period.status(), StatusCode::OK);
}

#[test_case(None ; "without a token")]
#[test_case(Some("not-a-jwt") ; "with a garbage token")]
#[tokio::test]
async fn anonymous_requests_are_rejected(token: Option<&str>) {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/orders", None, token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_issues_a_usable_token() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "username": "cashier", "password": "correct-horse-battery" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["user"]["role"], "cashier");
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let me = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(&token))
        .await;
    assert_eq!(me.status(), StatusCode::OK);
    let me = response_json(me).await;
    assert_eq!(me["data"]["username"], "cashier");
    assert!(me["data"]["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .all(|p| p != "end_day:run"));

    let wrong = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "username": "cashier", "password": "nope-nope-nope" })),
            None,
        )
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_manages_users() {
    let app = TestApp::new().await;
    let request = json!({
        "username": "manager",
        "password": "branch-manager-pw",
        "role": "branch_manager",
        "full_name": "Ayesha"
    });

    let created = app
        .admin(Method::POST, "/api/v1/users", Some(request.clone()), StatusCode::CREATED)
        .await;
    assert_eq!(created["data"]["role"], "branch_manager");

    app.admin(Method::POST, "/api/v1/users", Some(request), StatusCode::CONFLICT)
        .await;

    let login = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "username": "manager", "password": "branch-manager-pw" })),
            None,
        )
        .await;
    let token = response_json(login).await["data"]["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let dashboard = app
        .request(Method::GET, "/api/v1/reports/dashboard", None, Some(&token))
        .await;
    assert_eq!(dashboard.status(), StatusCode::OK);
    let settings = app
        .request(
            Method::PUT,
            "/api/v1/settings/business_name",
            Some(json!({ "value": "Branch 2" })),
            Some(&token),
        )
        .await;
    assert_eq!(settings.status(), StatusCode::FORBIDDEN);
}
