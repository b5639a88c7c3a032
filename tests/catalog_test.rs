//! Categories, products, stock edits and product images.

mod common;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
};
use common::{money, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn category_names_are_unique_and_in_use_categories_stay() {
    let app = TestApp::new().await;

    let created = app
        .admin(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "Starters", "description": "Small plates" })),
            StatusCode::CREATED,
        )
        .await;
    let id = created["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["is_active"], true);

    app.admin(
        Method::POST,
        "/api/v1/categories",
        Some(json!({ "name": "Starters" })),
        StatusCode::CONFLICT,
    )
    .await;

    let category_id = uuid::Uuid::parse_str(&id).unwrap();
    app.seed_product(category_id, "Samosa", dec!(60), 30, false).await;
    app.admin(
        Method::DELETE,
        &format!("/api/v1/categories/{}", id),
        None,
        StatusCode::CONFLICT,
    )
    .await;

    let empty = app.seed_category("Seasonal").await;
    app.admin(
        Method::DELETE,
        &format!("/api/v1/categories/{}", empty.id),
        None,
        StatusCode::NO_CONTENT,
    )
    .await;
    app.admin(
        Method::GET,
        &format!("/api/v1/categories/{}", empty.id),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
}

#[tokio::test]
async fn inactive_categories_drop_out_of_the_active_list() {
    let app = TestApp::new().await;
    let breakfast = app.seed_category("Breakfast").await;
    app.seed_category("Dinner").await;

    app.admin(
        Method::PUT,
        &format!("/api/v1/categories/{}", breakfast.id),
        Some(json!({ "is_active": false })),
        StatusCode::OK,
    )
    .await;

    let active = app
        .admin(Method::GET, "/api/v1/categories/active", None, StatusCode::OK)
        .await;
    let names: Vec<&str> = active["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Dinner"]);
}

#[tokio::test]
async fn products_are_created_searched_and_flagged_low() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;

    let created = app
        .admin(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "category_id": mains.id,
                "name": "Chicken Karahi",
                "price": "1200.50",
                "stock_quantity": 3
            })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(money(&created["data"]["price"]), dec!(1200.50));

    app.admin(
        Method::POST,
        "/api/v1/products",
        Some(json!({ "category_id": mains.id, "name": "Broken", "price": "-1" })),
        StatusCode::BAD_REQUEST,
    )
    .await;
    app.admin(
        Method::POST,
        "/api/v1/products",
        Some(json!({ "category_id": uuid::Uuid::new_v4(), "name": "Orphan", "price": "10" })),
        StatusCode::BAD_REQUEST,
    )
    .await;

    app.seed_product(mains.id, "Mutton Karahi", dec!(1800), 50, false).await;
    let found = app
        .admin(Method::GET, "/api/v1/products/search?q=karahi", None, StatusCode::OK)
        .await;
    assert_eq!(found["data"].as_array().unwrap().len(), 2);

    // default threshold is 10
    let low = app
        .admin(Method::GET, "/api/v1/products/low-stock", None, StatusCode::OK)
        .await;
    let low = low["data"].as_array().unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0]["name"], "Chicken Karahi");
}

#[tokio::test]
async fn stock_can_be_set_but_not_negative() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let daal = app.seed_product(mains.id, "Daal", dec!(250), 4, false).await;

    let updated = app
        .admin(
            Method::PUT,
            &format!("/api/v1/products/{}/stock", daal.id),
            Some(json!({ "stock_quantity": 40 })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(updated["data"]["stock_quantity"], 40);

    app.admin(
        Method::PUT,
        &format!("/api/v1/products/{}/stock", daal.id),
        Some(json!({ "stock_quantity": -2 })),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(app.stock_of(daal.id).await, 40);
}

#[tokio::test]
async fn sold_products_are_archived_instead_of_deleted() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let sold = app.seed_product(mains.id, "Haleem", dec!(350), 10, false).await;
    let unsold = app.seed_product(mains.id, "Paya", dec!(400), 10, false).await;

    app.admin(
        Method::POST,
        "/api/v1/orders",
        Some(json!({
            "order_type": "Take Away",
            "payment_method": "Cash",
            "items": [{ "product_id": sold.id, "quantity": 1 }]
        })),
        StatusCode::CREATED,
    )
    .await;

    let archived = app
        .admin(
            Method::DELETE,
            &format!("/api/v1/products/{}", sold.id),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(archived["data"]["outcome"], "archived");

    let deleted = app
        .admin(
            Method::DELETE,
            &format!("/api/v1/products/{}", unsold.id),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(deleted["data"]["outcome"], "deleted");

    let available = app
        .admin(Method::GET, "/api/v1/products/available", None, StatusCode::OK)
        .await;
    assert!(available["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn product_images_round_trip_with_etags() {
    let app = TestApp::new().await;
    let mains = app.seed_category("Mains").await;
    let product = app.seed_product(mains.id, "Kebab", dec!(300), 10, false).await;
    let uri = format!("/api/v1/products/{}/image", product.id);
    let png = b"\x89PNG\r\n\x1a\nfake-image-bytes".to_vec();

    let upload = app
        .send_as_admin(
            Request::builder()
                .method(Method::PUT)
                .uri(&uri)
                .header(header::CONTENT_TYPE, "image/png"),
            Body::from(png.clone()),
        )
        .await;
    assert_eq!(upload.status(), StatusCode::OK);

    let fetched = app
        .send_as_admin(Request::builder().method(Method::GET).uri(&uri), Body::empty())
        .await;
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(fetched.headers()[header::CONTENT_TYPE], "image/png");
    let etag = fetched.headers()[header::ETAG].to_str().unwrap().to_string();
    let bytes = body::to_bytes(fetched.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), png.as_slice());

    let cached = app
        .send_as_admin(
            Request::builder()
                .method(Method::GET)
                .uri(&uri)
                .header(header::IF_NONE_MATCH, etag),
            Body::empty(),
        )
        .await;
    assert_eq!(cached.status(), StatusCode::NOT_MODIFIED);

    let rejected = app
        .send_as_admin(
            Request::builder()
                .method(Method::PUT)
                .uri(&uri)
                .header(header::CONTENT_TYPE, "image/svg+xml"),
            Body::from("<svg/>"),
        )
        .await;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    app.admin(Method::DELETE, &uri, None, StatusCode::OK).await;
    app.admin(Method::GET, &uri, None, StatusCode::NOT_FOUND).await;
}
