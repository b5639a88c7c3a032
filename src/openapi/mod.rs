use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// Registers the `Bearer` JWT scheme referenced by the handlers.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                Http::builder()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "POS Back Office API",
        version = "1.0.0",
        description = r#"
# POS Back Office API

Catalog, order entry, discounts, receipts, End Day reconciliation and reporting for a restaurant till.

## Authentication

Sign in with `POST /api/v1/auth/login` and send the token on every other call:

```
Authorization: Bearer <your-jwt-token>
```

## Totals

Order totals are computed server-side: subtotal, discount, tax (card or cash rate), Dine In service charge and Delivery charge, rounded to 2 decimals.

## Error Handling

```json
{
  "error": "Unprocessable Entity",
  "message": "Insufficient stock for Burger: requested 3 more, available 1",
  "request_id": "8c7d...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints take `page` (default 1) and `limit` (default and maximum from configuration).
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "auth", description = "Sign-in and users"),
        (name = "categories", description = "Menu categories"),
        (name = "products", description = "Products, stock and images"),
        (name = "orders", description = "Order entry, payment and receipts"),
        (name = "pos", description = "Till screen endpoints"),
        (name = "discounts", description = "Discount codes"),
        (name = "settings", description = "Business, tax and charge settings"),
        (name = "adjustments", description = "Bill and advance adjustments"),
        (name = "end-day", description = "End Day reconciliation"),
        (name = "reports", description = "Dashboard and sales reports"),
        (name = "audit", description = "Audit log")
    ),
    paths(
        // Auth
        crate::handlers::auth::login,
        crate::handlers::auth::me,
        crate::handlers::auth::create_user,

        // Catalog
        crate::handlers::categories::list_categories,
        crate::handlers::categories::list_active_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::create_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,
        crate::handlers::products::list_products,
        crate::handlers::products::search_products,
        crate::handlers::products::list_available_products,
        crate::handlers::products::list_low_stock_products,
        crate::handlers::products::list_category_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::update_product_stock,
        crate::handlers::products::delete_product,
        crate::handlers::products::get_product_image,
        crate::handlers::products::upload_product_image,
        crate::handlers::products::delete_product_image,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::list_today_orders,
        crate::handlers::orders::list_orders_by_status,
        crate::handlers::orders::get_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::add_order_item,
        crate::handlers::orders::update_order_item,
        crate::handlers::orders::remove_order_item,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::pay_order,
        crate::handlers::orders::complete_order,
        crate::handlers::orders::get_receipt,
        crate::handlers::orders::get_receipt_text,

        // Till
        crate::handlers::pos::create_order,
        crate::handlers::pos::validate_discount,
        crate::handlers::pos::check_stock,

        // Discounts
        crate::handlers::discounts::list_discounts,
        crate::handlers::discounts::list_active_discounts,
        crate::handlers::discounts::get_discount,
        crate::handlers::discounts::validate_discount,
        crate::handlers::discounts::create_discount,
        crate::handlers::discounts::update_discount,
        crate::handlers::discounts::delete_discount,

        // Settings
        crate::handlers::settings::list_settings,
        crate::handlers::settings::get_business_info,
        crate::handlers::settings::get_logo,
        crate::handlers::settings::upload_logo,
        crate::handlers::settings::delete_logo,
        crate::handlers::settings::get_setting,
        crate::handlers::settings::upsert_setting,
        crate::handlers::settings::bulk_update_settings,
        crate::handlers::settings::delete_setting,

        // Adjustments
        crate::handlers::adjustments::list_bills,
        crate::handlers::adjustments::get_bill,
        crate::handlers::adjustments::create_bill,
        crate::handlers::adjustments::update_bill,
        crate::handlers::adjustments::delete_bill,
        crate::handlers::adjustments::list_bill_images,
        crate::handlers::adjustments::upload_bill_image,
        crate::handlers::adjustments::get_bill_image,
        crate::handlers::adjustments::delete_bill_image,
        crate::handlers::adjustments::list_advances,
        crate::handlers::adjustments::get_advance,
        crate::handlers::adjustments::create_advance,
        crate::handlers::adjustments::update_advance,
        crate::handlers::adjustments::delete_advance,
        crate::handlers::adjustments::adjustment_report,
        crate::handlers::adjustments::adjustment_receipt,
        crate::handlers::adjustments::adjustment_receipt_text,

        // End day
        crate::handlers::end_day::list_end_days,
        crate::handlers::end_day::current_period,
        crate::handlers::end_day::last_end_day,
        crate::handlers::end_day::get_end_day,
        crate::handlers::end_day::run_end_day,

        // Reports and audit
        crate::handlers::reports::dashboard,
        crate::handlers::reports::sales_report,
        crate::handlers::reports::top_products,
        crate::handlers::reports::category_sales,
        crate::handlers::audit::list_audit_logs,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::auth::Role,
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentStatus,
            crate::entities::order::OrderType,
            crate::entities::order::PaymentMethod,
            crate::entities::discount::DiscountType,
            crate::services::reports::RangePreset,
            crate::services::reports::GroupBy,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_the_till_endpoints() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("POS Back Office API"));
        assert!(json.contains("/api/v1/pos/orders"));
        assert!(json.contains("/api/v1/orders/{id}/receipt.txt"));
        assert!(json.contains("/api/v1/adjustments/receipt.txt"));
        assert!(json.contains("/api/v1/settings/logo"));
        assert!(json.contains("\"Bearer\""));
    }
}
