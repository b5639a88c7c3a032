//! Settings, adjustments, End Day, reports and the audit trail.

mod common;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
};
use common::{money, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn defaults_are_seeded_and_rates_drive_new_orders() {
    let app = TestApp::new().await;

    let card = app
        .admin(Method::GET, "/api/v1/settings/tax_rate_card", None, StatusCode::OK)
        .await;
    assert_eq!(card["data"]["setting_value"], "5");

    app.admin(
        Method::PUT,
        "/api/v1/settings/tax_rate_cash",
        Some(json!({ "value": "150" })),
        StatusCode::BAD_REQUEST,
    )
    .await;
    app.admin(
        Method::PUT,
        "/api/v1/settings/tax_rate_cash",
        Some(json!({ "value": "0" })),
        StatusCode::OK,
    )
    .await;

    let mains = app.seed_category("Mains").await;
    let pulao = app.seed_product(mains.id, "Pulao", dec!(400), 10, false).await;
    let order = app
        .admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "order_type": "Take Away",
                "payment_method": "Cash",
                "items": [{ "product_id": pulao.id, "quantity": 1 }]
            })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(money(&order["data"]["order"]["tax_amount"]), dec!(0));
    assert_eq!(money(&order["data"]["order"]["total_amount"]), dec!(400));
}

#[tokio::test]
async fn bulk_updates_are_all_or_nothing() {
    let app = TestApp::new().await;

    app.admin(
        Method::PUT,
        "/api/v1/settings",
        Some(json!({ "business_name": "Karachi Grill", "service_charge_percent": "abc" })),
        StatusCode::BAD_REQUEST,
    )
    .await;
    let info = app
        .admin(Method::GET, "/api/v1/settings/business", None, StatusCode::OK)
        .await;
    assert_ne!(info["data"]["business_name"], "Karachi Grill");

    app.admin(
        Method::PUT,
        "/api/v1/settings",
        Some(json!({ "business_name": "Karachi Grill", "receipt_footer": "Shukriya!" })),
        StatusCode::OK,
    )
    .await;
    let info = app
        .admin(Method::GET, "/api/v1/settings/business", None, StatusCode::OK)
        .await;
    assert_eq!(info["data"]["business_name"], "Karachi Grill");
    assert_eq!(info["data"]["receipt_footer"], "Shukriya!");

    app.admin(
        Method::DELETE,
        "/api/v1/settings/tax_rate_card",
        None,
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn end_day_closes_the_period_net_of_adjustments() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let karahi = app.seed_product(mains.id, "Chicken Karahi", dec!(500), 20, false).await;

    for method in ["Cash", "Card"] {
        app.admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "order_type": "Take Away",
                "payment_method": method,
                "items": [{ "product_id": karahi.id, "quantity": 2 }]
            })),
            StatusCode::CREATED,
        )
        .await;
    }
    let cancelled = app
        .admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "order_type": "Take Away",
                "payment_method": "Cash",
                "items": [{ "product_id": karahi.id, "quantity": 1 }]
            })),
            StatusCode::CREATED,
        )
        .await;
    let cancelled_id = cancelled["data"]["order"]["id"].as_str().unwrap().to_string();
    app.admin(
        Method::POST,
        &format!("/api/v1/orders/{}/cancel", cancelled_id),
        None,
        StatusCode::OK,
    )
    .await;

    app.admin(
        Method::POST,
        "/api/v1/adjustments/bills",
        Some(json!({ "name": "Gas cylinder", "price": "120" })),
        StatusCode::CREATED,
    )
    .await;
    app.admin(
        Method::POST,
        "/api/v1/adjustments/advances",
        Some(json!({ "name": "Staff advance", "amount": "80" })),
        StatusCode::CREATED,
    )
    .await;

    app.admin(Method::GET, "/api/v1/end-day/last", None, StatusCode::NOT_FOUND)
        .await;

    let closed = app
        .admin(
            Method::POST,
            "/api/v1/end-day",
            Some(json!({ "notes": "Quiet Tuesday" })),
            StatusCode::CREATED,
        )
        .await;
    let summary = &closed["data"]["summary"];
    assert_eq!(summary["order_count"], 3);
    assert_eq!(summary["cancelled_orders"], 1);
    assert_eq!(summary["pending_orders"], 2);
    // 1000 + 15% cash and 1000 + 5% card
    assert_eq!(money(&summary["cash_sales"]), dec!(1150));
    assert_eq!(money(&summary["card_sales"]), dec!(1050));
    assert_eq!(money(&summary["gross_sales"]), dec!(2200));
    assert_eq!(money(&summary["bill_adjustments_total"]), dec!(120));
    assert_eq!(money(&summary["advance_adjustments_total"]), dec!(80));
    assert_eq!(money(&summary["net_total"]), dec!(2000));
    assert_eq!(closed["data"]["end_day"]["notes"], "Quiet Tuesday");

    let last = app
        .admin(Method::GET, "/api/v1/end-day/last", None, StatusCode::OK)
        .await;
    assert_eq!(last["data"]["end_day"]["id"], closed["data"]["end_day"]["id"]);

    let current = app
        .admin(Method::GET, "/api/v1/end-day/current", None, StatusCode::OK)
        .await;
    assert_eq!(current["data"]["order_count"], 0);
    assert_eq!(money(&current["data"]["net_total"]), dec!(0));

    // a body is optional
    let again = app
        .admin(Method::POST, "/api/v1/end-day", None, StatusCode::CREATED)
        .await;
    assert_eq!(again["data"]["summary"]["order_count"], 0);

    let history = app
        .admin(Method::GET, "/api/v1/end-day", None, StatusCode::OK)
        .await;
    assert_eq!(history["data"]["total"], 2);
}

#[tokio::test]
async fn bills_and_advances_are_editable_and_reported() {
    let app = TestApp::new().await;

    let bill = app
        .admin(
            Method::POST,
            "/api/v1/adjustments/bills",
            Some(json!({ "name": "Vegetables", "quantity": 2, "price": "300" })),
            StatusCode::CREATED,
        )
        .await;
    let bill_id = bill["data"]["id"].as_str().unwrap().to_string();
    let updated = app
        .admin(
            Method::PUT,
            &format!("/api/v1/adjustments/bills/{}", bill_id),
            Some(json!({ "price": "350" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(money(&updated["data"]["price"]), dec!(350));

    app.admin(
        Method::POST,
        "/api/v1/adjustments/advances",
        Some(json!({ "name": "Rider", "amount": "0" })),
        StatusCode::BAD_REQUEST,
    )
    .await;
    app.admin(
        Method::POST,
        "/api/v1/adjustments/advances",
        Some(json!({ "name": "Rider", "amount": "500" })),
        StatusCode::CREATED,
    )
    .await;

    let report = app
        .admin(Method::GET, "/api/v1/adjustments/report", None, StatusCode::OK)
        .await;
    assert_eq!(report["data"]["bill_count"], 1);
    assert_eq!(report["data"]["advance_count"], 1);
    assert_eq!(money(&report["data"]["bill_total"]), dec!(350));
    assert_eq!(money(&report["data"]["advance_total"]), dec!(500));

    app.admin(
        Method::DELETE,
        &format!("/api/v1/adjustments/bills/{}", bill_id),
        None,
        StatusCode::NO_CONTENT,
    )
    .await;
    app.admin(
        Method::GET,
        &format!("/api/v1/adjustments/bills/{}", bill_id),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
}

#[tokio::test]
async fn reports_and_audit_reflect_sales() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let tikka = app.seed_product(mains.id, "Tikka", dec!(100), 50, false).await;

    let created = app
        .admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "order_type": "Take Away",
                "payment_method": "Card",
                "items": [{ "product_id": tikka.id, "quantity": 3 }]
            })),
            StatusCode::CREATED,
        )
        .await;
    let id = created["data"]["order"]["id"].as_str().unwrap().to_string();
    app.admin(
        Method::POST,
        &format!("/api/v1/orders/{}/pay", id),
        None,
        StatusCode::OK,
    )
    .await;
    app.admin(
        Method::POST,
        &format!("/api/v1/orders/{}/complete", id),
        None,
        StatusCode::OK,
    )
    .await;

    let dashboard = app
        .admin(Method::GET, "/api/v1/reports/dashboard", None, StatusCode::OK)
        .await;
    assert_eq!(dashboard["data"]["today"]["orders"], 1);
    assert_eq!(money(&dashboard["data"]["today"]["revenue"]), dec!(315));
    assert_eq!(dashboard["data"]["pending_orders"], 0);

    let top = app
        .admin(Method::GET, "/api/v1/reports/top-products?limit=5", None, StatusCode::OK)
        .await;
    assert_eq!(top["data"][0]["name"], "Tikka");
    assert_eq!(top["data"][0]["quantity_sold"], 3);

    let sales = app
        .admin(
            Method::GET,
            "/api/v1/reports/sales?range=7days&group_by=day",
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(sales["data"]["total_orders"], 1);

    app.admin(
        Method::GET,
        "/api/v1/reports/sales?range=custom",
        None,
        StatusCode::BAD_REQUEST,
    )
    .await;

    let audit = app
        .admin(Method::GET, "/api/v1/audit-logs?entity=order", None, StatusCode::OK)
        .await;
    let actions: Vec<&str> = audit["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["action"].as_str().unwrap())
        .collect();
    assert!(actions.contains(&"order.create"));
    assert!(actions.contains(&"order.pay"));
    assert!(actions.contains(&"order.complete"));
}

#[tokio::test]
async fn business_logo_is_served_and_referenced_by_receipts() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let pulao = app.seed_product(mains.id, "Pulao", dec!(400), 10, false).await;
    let created = app
        .admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "order_type": "Take Away",
                "payment_method": "Cash",
                "items": [{ "product_id": pulao.id, "quantity": 1 }]
            })),
            StatusCode::CREATED,
        )
        .await;
    let receipt_uri = format!(
        "/api/v1/orders/{}/receipt",
        created["data"]["order"]["id"].as_str().unwrap()
    );

    // switched on by default, but nothing uploaded yet
    let receipt = app.admin(Method::GET, &receipt_uri, None, StatusCode::OK).await;
    assert!(receipt["data"]["logo_url"].is_null());
    app.admin(Method::GET, "/api/v1/settings/logo", None, StatusCode::NOT_FOUND)
        .await;

    let png = b"\x89PNG\r\n\x1a\nlogo-bytes".to_vec();
    let upload = app
        .send_as_admin(
            Request::builder()
                .method(Method::PUT)
                .uri("/api/v1/settings/logo")
                .header(header::CONTENT_TYPE, "image/png"),
            Body::from(png.clone()),
        )
        .await;
    assert_eq!(upload.status(), StatusCode::OK);
    let info = response_json(upload).await;
    assert_eq!(info["data"]["url"], "/api/v1/settings/logo");
    assert_eq!(info["data"]["size"], png.len());

    let fetched = app
        .send_as_admin(
            Request::builder().method(Method::GET).uri("/api/v1/settings/logo"),
            Body::empty(),
        )
        .await;
    assert_eq!(fetched.status(), StatusCode::OK);
    let etag = fetched.headers()[header::ETAG].to_str().unwrap().to_string();
    assert_eq!(etag, info["data"]["etag"].as_str().unwrap());
    let bytes = body::to_bytes(fetched.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), png.as_slice());

    let cached = app
        .send_as_admin(
            Request::builder()
                .method(Method::GET)
                .uri("/api/v1/settings/logo")
                .header(header::IF_NONE_MATCH, etag),
            Body::empty(),
        )
        .await;
    assert_eq!(cached.status(), StatusCode::NOT_MODIFIED);

    let receipt = app.admin(Method::GET, &receipt_uri, None, StatusCode::OK).await;
    assert_eq!(receipt["data"]["logo_url"], "/api/v1/settings/logo");
    let statement = app
        .admin(Method::GET, "/api/v1/adjustments/receipt", None, StatusCode::OK)
        .await;
    assert_eq!(statement["data"]["logo_url"], "/api/v1/settings/logo");

    app.admin(
        Method::PUT,
        "/api/v1/settings/show_logo",
        Some(json!({ "value": "false" })),
        StatusCode::OK,
    )
    .await;
    let receipt = app.admin(Method::GET, &receipt_uri, None, StatusCode::OK).await;
    assert!(receipt["data"]["logo_url"].is_null());

    let cashier = app
        .request(Method::DELETE, "/api/v1/settings/logo", None, Some(app.cashier_token()))
        .await;
    assert_eq!(cashier.status(), StatusCode::FORBIDDEN);
    app.admin(Method::DELETE, "/api/v1/settings/logo", None, StatusCode::NO_CONTENT)
        .await;
    app.admin(Method::GET, "/api/v1/settings/logo", None, StatusCode::NOT_FOUND)
        .await;
}

#[tokio::test]
async fn adjustment_receipt_prints_each_bill_and_advance() {
    let app = TestApp::new().await;
    app.admin(
        Method::PUT,
        "/api/v1/settings",
        Some(json!({ "business_name": "Karachi Grill", "currency_symbol": "Rs " })),
        StatusCode::OK,
    )
    .await;
    app.admin(
        Method::POST,
        "/api/v1/adjustments/bills",
        Some(json!({ "name": "Vegetables", "quantity": 2, "price": "300" })),
        StatusCode::CREATED,
    )
    .await;
    app.admin(
        Method::POST,
        "/api/v1/adjustments/bills",
        Some(json!({ "name": "Gas cylinder", "price": "120.50" })),
        StatusCode::CREATED,
    )
    .await;
    app.admin(
        Method::POST,
        "/api/v1/adjustments/advances",
        Some(json!({ "name": "Rider", "amount": "500" })),
        StatusCode::CREATED,
    )
    .await;

    let receipt = app
        .admin(Method::GET, "/api/v1/adjustments/receipt", None, StatusCode::OK)
        .await;
    assert_eq!(receipt["data"]["bills"].as_array().unwrap().len(), 2);
    assert_eq!(receipt["data"]["advances"][0]["name"], "Rider");
    assert_eq!(money(&receipt["data"]["total"]), dec!(920.50));

    let response = app
        .request(
            Method::GET,
            "/api/v1/adjustments/receipt.txt",
            None,
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    let text = response_json(response).await;
    let text = text.as_str().unwrap();
    assert!(text.contains("Karachi Grill"));
    assert!(text.contains("ADJUSTMENT REPORT"));
    assert!(text.contains("Vegetables x2"));
    assert!(text.contains("Bills (2)"));
    assert!(text.contains("Rs 420.50"));
    assert!(text.contains("Rs 920.50"));
}
