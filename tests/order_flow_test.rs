//! Order lifecycle over HTTP: totals, stock, payment, completion and receipts.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{money, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn dine_in_cash_order_is_priced_paid_and_completed() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let karahi = app.seed_product(mains.id, "Chicken Karahi", dec!(500), 10, false).await;

    let created = app
        .admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "order_type": "Dine In",
                "payment_method": "Cash",
                "customer_name": "Table 4",
                "items": [{ "product_id": karahi.id, "quantity": 2 }]
            })),
            StatusCode::CREATED,
        )
        .await;

    let order = &created["data"]["order"];
    assert_eq!(money(&order["subtotal"]), dec!(1000));
    assert_eq!(money(&order["tax_amount"]), dec!(150));
    assert_eq!(money(&order["service_charge"]), dec!(100));
    assert_eq!(money(&order["delivery_charges"]), dec!(0));
    assert_eq!(money(&order["total_amount"]), dec!(1250));
    assert_eq!(order["order_status"], "Pending");
    assert_eq!(order["payment_status"], "Pending");
    assert!(order["order_number"].as_str().unwrap().starts_with("ORD-"));
    assert_eq!(app.stock_of(karahi.id).await, 8);

    let id = order["id"].as_str().unwrap().to_string();

    // completing before payment is refused
    app.admin(
        Method::POST,
        &format!("/api/v1/orders/{}/complete", id),
        None,
        StatusCode::BAD_REQUEST,
    )
    .await;

    let paid = app
        .admin(
            Method::POST,
            &format!("/api/v1/orders/{}/pay", id),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(paid["data"]["order"]["payment_status"], "Paid");
    let payments = paid["data"]["payments"].as_array().unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(money(&payments[0]["amount"]), dec!(1250));

    let completed = app
        .admin(
            Method::POST,
            &format!("/api/v1/orders/{}/complete", id),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(completed["data"]["order"]["order_status"], "Completed");

    // completed orders stay completed
    app.admin(
        Method::POST,
        &format!("/api/v1/orders/{}/cancel", id),
        None,
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(app.stock_of(karahi.id).await, 8);

    let receipt = app
        .admin(
            Method::GET,
            &format!("/api/v1/orders/{}/receipt", id),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(money(&receipt["data"]["total"]), dec!(1250));
    assert_eq!(receipt["data"]["lines"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn paying_by_card_switches_the_tax_rate() {
    let app = TestApp::new().await;
    let drinks = app.seed_category("Drinks").await;
    let lassi = app.seed_product(drinks.id, "Lassi", dec!(200), 20, false).await;

    let created = app
        .admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "order_type": "Take Away",
                "payment_method": "Cash",
                "items": [{ "product_id": lassi.id, "quantity": 1 }]
            })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(money(&created["data"]["order"]["total_amount"]), dec!(230));
    let id = created["data"]["order"]["id"].as_str().unwrap().to_string();

    let paid = app
        .admin(
            Method::POST,
            &format!("/api/v1/orders/{}/pay", id),
            Some(json!({ "payment_method": "Card" })),
            StatusCode::OK,
        )
        .await;
    let order = &paid["data"]["order"];
    assert_eq!(order["payment_method"], "Card");
    assert_eq!(money(&order["tax_amount"]), dec!(10));
    assert_eq!(money(&order["total_amount"]), dec!(210));

    // paying twice is refused
    app.admin(
        Method::POST,
        &format!("/api/v1/orders/{}/pay", id),
        None,
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn cancelling_restores_stock() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let biryani = app.seed_product(mains.id, "Biryani", dec!(450), 5, false).await;

    let created = app
        .admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "order_type": "Delivery",
                "payment_method": "Cash",
                "items": [
                    { "product_id": biryani.id, "quantity": 2 },
                    { "product_id": biryani.id, "quantity": 1 }
                ]
            })),
            StatusCode::CREATED,
        )
        .await;
    // duplicate lines are merged
    assert_eq!(created["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(created["data"]["items"][0]["quantity"], 3);
    assert_eq!(app.stock_of(biryani.id).await, 2);

    let id = created["data"]["order"]["id"].as_str().unwrap().to_string();
    let cancelled = app
        .admin(
            Method::DELETE,
            &format!("/api/v1/orders/{}", id),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(cancelled["data"]["order"]["order_status"], "Cancelled");
    assert_eq!(app.stock_of(biryani.id).await, 5);

    app.admin(
        Method::POST,
        &format!("/api/v1/orders/{}/cancel", id),
        None,
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn insufficient_stock_is_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let burger = app.seed_product(mains.id, "Burger", dec!(650), 1, false).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "order_type": "Take Away",
                "payment_method": "Cash",
                "items": [{ "product_id": burger.id, "quantity": 3 }]
            })),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("Burger"), "{}", message);
    assert!(message.contains("available 1"), "{}", message);

    assert_eq!(app.stock_of(burger.id).await, 1);
    let orders = app
        .admin(Method::GET, "/api/v1/orders", None, StatusCode::OK)
        .await;
    assert_eq!(orders["data"]["total"], 0);
}

#[tokio::test]
async fn editing_lines_moves_stock_and_reprices() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let nihari = app.seed_product(mains.id, "Nihari", dec!(300), 10, false).await;
    let naan = app.seed_product(mains.id, "Naan", dec!(50), 10, false).await;

    let created = app
        .admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "order_type": "Take Away",
                "payment_method": "Card",
                "items": [{ "product_id": nihari.id, "quantity": 1 }]
            })),
            StatusCode::CREATED,
        )
        .await;
    let id = created["data"]["order"]["id"].as_str().unwrap().to_string();

    let added = app
        .admin(
            Method::POST,
            &format!("/api/v1/orders/{}/items", id),
            Some(json!({ "product_id": naan.id, "quantity": 4 })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(money(&added["data"]["order"]["subtotal"]), dec!(500));
    assert_eq!(app.stock_of(naan.id).await, 6);

    let naan_line = added["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|line| line["product_id"] == json!(naan.id))
        .cloned()
        .unwrap();
    let line_id = naan_line["id"].as_str().unwrap();

    let updated = app
        .admin(
            Method::PUT,
            &format!("/api/v1/orders/{}/items/{}", id, line_id),
            Some(json!({ "quantity": 2 })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(money(&updated["data"]["order"]["subtotal"]), dec!(400));
    assert_eq!(app.stock_of(naan.id).await, 8);

    let removed = app
        .admin(
            Method::DELETE,
            &format!("/api/v1/orders/{}/items/{}", id, line_id),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(money(&removed["data"]["order"]["subtotal"]), dec!(300));
    // card tax at 5%
    assert_eq!(money(&removed["data"]["order"]["total_amount"]), dec!(315));
    assert_eq!(app.stock_of(naan.id).await, 10);
}

#[tokio::test]
async fn discount_codes_apply_and_expired_codes_only_warn() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let karahi = app.seed_product(mains.id, "Chicken Karahi", dec!(500), 10, false).await;
    let today = Utc::now().date_naive();

    app.admin(
        Method::POST,
        "/api/v1/discounts",
        Some(json!({
            "name": "Ten off",
            "code": "TEN",
            "discount_type": "Percentage",
            "value": "10"
        })),
        StatusCode::CREATED,
    )
    .await;
    app.admin(
        Method::POST,
        "/api/v1/discounts",
        Some(json!({
            "name": "Last week",
            "code": "OLD",
            "discount_type": "Fixed",
            "value": "100",
            "start_date": today - Duration::days(10),
            "end_date": today - Duration::days(3)
        })),
        StatusCode::CREATED,
    )
    .await;

    let discounted = app
        .admin(
            Method::POST,
            "/api/v1/pos/orders",
            Some(json!({
                "order_type": "Dine In",
                "payment_method": "Cash",
                "discount_code": "TEN",
                "items": [{ "product_id": karahi.id, "quantity": 2 }]
            })),
            StatusCode::CREATED,
        )
        .await;
    let data = &discounted["data"];
    assert_eq!(money(&data["discount_amount"]), dec!(100));
    assert_eq!(money(&data["tax_amount"]), dec!(135));
    // service charge is on the undiscounted subtotal
    assert_eq!(money(&data["service_charge"]), dec!(100));
    assert_eq!(money(&data["total_amount"]), dec!(1135));
    assert!(data.get("discount_warning").is_none());

    let expired = app
        .admin(
            Method::POST,
            "/api/v1/pos/orders",
            Some(json!({
                "order_type": "Take Away",
                "payment_method": "Cash",
                "discount_code": "OLD",
                "items": [{ "product_id": karahi.id, "quantity": 1 }]
            })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(money(&expired["data"]["discount_amount"]), dec!(0));
    assert_eq!(money(&expired["data"]["total_amount"]), dec!(575));
    assert!(expired["data"]["discount_warning"].is_string());

    let check = app
        .admin(
            Method::POST,
            "/api/v1/pos/discounts/validate",
            Some(json!({ "code": "OLD" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(check["data"]["valid"], false);
}

#[tokio::test]
async fn stock_check_reports_each_line() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let tikka = app.seed_product(mains.id, "Tikka", dec!(400), 2, false).await;

    let check = app
        .admin(
            Method::POST,
            "/api/v1/pos/stock/check",
            Some(json!({ "items": [{ "product_id": tikka.id, "quantity": 3 }] })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(check["data"]["all_available"], false);
    assert_eq!(check["data"]["items"][0]["available"], 2);

    app.admin(
        Method::POST,
        "/api/v1/pos/stock/check",
        Some(json!({ "items": [] })),
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "order_type": "Spaceship", "payment_method": "Cash", "items": [] })),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let empty = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "order_type": "Take Away", "payment_method": "Cash", "items": [] })),
            Some(app.admin_token()),
        )
        .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn running_items_never_touch_stock() {
    let app = TestApp::new().await;
    let drinks = app.seed_category("Drinks").await;
    let chai = app.seed_product(drinks.id, "Doodh Patti", dec!(80), 10, true).await;
    let samosa = app.seed_product(drinks.id, "Samosa", dec!(60), 10, false).await;

    let created = app
        .admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "order_type": "Take Away",
                "payment_method": "Cash",
                "items": [{ "product_id": chai.id, "quantity": 3 }]
            })),
            StatusCode::CREATED,
        )
        .await;
    let id = created["data"]["order"]["id"].as_str().unwrap().to_string();
    assert_eq!(app.stock_of(chai.id).await, 10);

    // more chai lands on the same line
    let added = app
        .admin(
            Method::POST,
            &format!("/api/v1/orders/{}/items", id),
            Some(json!({ "product_id": chai.id, "quantity": 12 })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(added["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(added["data"]["items"][0]["quantity"], 15);
    assert_eq!(app.stock_of(chai.id).await, 10);

    app.admin(
        Method::POST,
        &format!("/api/v1/orders/{}/items", id),
        Some(json!({ "product_id": samosa.id, "quantity": 2 })),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(app.stock_of(samosa.id).await, 8);

    let line_id = added["data"]["items"][0]["id"].as_str().unwrap().to_string();
    let updated = app
        .admin(
            Method::PUT,
            &format!("/api/v1/orders/{}/items/{}", id, line_id),
            Some(json!({ "quantity": 25 })),
            StatusCode::OK,
        )
        .await;
    // 25 * 80 + 2 * 60, plus 15% cash tax
    assert_eq!(money(&updated["data"]["order"]["subtotal"]), dec!(2120));
    assert_eq!(money(&updated["data"]["order"]["total_amount"]), dec!(2438));
    assert_eq!(app.stock_of(chai.id).await, 10);

    app.admin(
        Method::POST,
        &format!("/api/v1/orders/{}/cancel", id),
        None,
        StatusCode::OK,
    )
    .await;
    assert_eq!(app.stock_of(chai.id).await, 10);
    assert_eq!(app.stock_of(samosa.id).await, 10);
}

#[tokio::test]
async fn cancelling_returns_what_each_line_took_even_after_the_product_changes() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let chai = app.seed_product(mains.id, "Chai", dec!(80), 10, true).await;
    let kebab = app.seed_product(mains.id, "Kebab", dec!(300), 10, false).await;

    let created = app
        .admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "order_type": "Take Away",
                "payment_method": "Cash",
                "items": [
                    { "product_id": chai.id, "quantity": 4 },
                    { "product_id": kebab.id, "quantity": 4 }
                ]
            })),
            StatusCode::CREATED,
        )
        .await;
    let id = created["data"]["order"]["id"].as_str().unwrap().to_string();
    assert_eq!(app.stock_of(chai.id).await, 10);
    assert_eq!(app.stock_of(kebab.id).await, 6);

    // flip both products after the sale
    app.admin(
        Method::PUT,
        &format!("/api/v1/products/{}", chai.id),
        Some(json!({ "running_item": false })),
        StatusCode::OK,
    )
    .await;
    app.admin(
        Method::PUT,
        &format!("/api/v1/products/{}", kebab.id),
        Some(json!({ "running_item": true })),
        StatusCode::OK,
    )
    .await;

    app.admin(
        Method::POST,
        &format!("/api/v1/orders/{}/cancel", id),
        None,
        StatusCode::OK,
    )
    .await;
    assert_eq!(app.stock_of(chai.id).await, 10);
    assert_eq!(app.stock_of(kebab.id).await, 10);
}

#[tokio::test]
async fn oversized_quantities_and_prices_are_rejected() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let roll = app.seed_product(mains.id, "Chicken Roll", dec!(250), 20_000, false).await;

    for items in [
        json!([
            { "product_id": roll.id, "quantity": 2147483647 },
            { "product_id": roll.id, "quantity": 2147483647 }
        ]),
        json!([
            { "product_id": roll.id, "quantity": 6000 },
            { "product_id": roll.id, "quantity": 5000 }
        ]),
        json!([{ "product_id": roll.id, "quantity": 10001 }]),
        json!([{ "product_id": roll.id, "quantity": 1000, "unit_price": "100000000000000000000000000" }]),
        json!([{ "product_id": roll.id, "quantity": 1, "unit_price": "10000000000" }]),
    ] {
        app.admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "order_type": "Take Away", "payment_method": "Cash", "items": items })),
            StatusCode::BAD_REQUEST,
        )
        .await;
    }
    assert_eq!(app.stock_of(roll.id).await, 20_000);

    let created = app
        .admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "order_type": "Take Away",
                "payment_method": "Cash",
                "items": [{ "product_id": roll.id, "quantity": 6000 }]
            })),
            StatusCode::CREATED,
        )
        .await;
    let id = created["data"]["order"]["id"].as_str().unwrap().to_string();
    app.admin(
        Method::POST,
        &format!("/api/v1/orders/{}/items", id),
        Some(json!({ "product_id": roll.id, "quantity": 5000 })),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(app.stock_of(roll.id).await, 14_000);

    app.admin(
        Method::POST,
        "/api/v1/pos/stock/check",
        Some(json!({ "items": [{ "product_id": roll.id, "quantity": 2147483647 }] })),
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn paid_orders_cannot_be_cancelled() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let haleem = app.seed_product(mains.id, "Haleem", dec!(350), 10, false).await;

    let created = app
        .admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "order_type": "Take Away",
                "payment_method": "Cash",
                "items": [{ "product_id": haleem.id, "quantity": 2 }]
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

    let refused = app
        .admin(
            Method::POST,
            &format!("/api/v1/orders/{}/cancel", id),
            None,
            StatusCode::BAD_REQUEST,
        )
        .await;
    assert!(refused["message"].as_str().unwrap().contains("paid"), "{}", refused);

    let order = app
        .admin(Method::GET, &format!("/api/v1/orders/{}", id), None, StatusCode::OK)
        .await;
    assert_eq!(order["data"]["order"]["order_status"], "Pending");
    assert_eq!(order["data"]["order"]["payment_status"], "Paid");
    assert_eq!(app.stock_of(haleem.id).await, 8);
}
